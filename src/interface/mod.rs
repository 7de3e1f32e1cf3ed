//! Interfaces: components that own mesh artifacts and react to assembly events.
//!
//! Three events fire, always in this order for one assembly:
//! 1. [`InterfaceEvent::PostAssemble`]: topology is fixed, interfaces build
//!    their nodes, cells and constraints.
//! 2. [`InterfaceEvent::ResolveCoreConflicts`]: the final `Core` assignment
//!    is known, interfaces place owned artifacts on cores.
//! 3. [`InterfaceEvent::PreExport`]: interfaces append their own records to
//!    the export stream.
//!
//! Interfaces live in an [`InterfaceRegistry`] arena and are addressed by
//! [`InterfaceId`]. An id is only a handle: dropping an interface through
//! [`InterfaceRegistry::unregister`] leaves stale ids resolving to `None`.
//! Dispatch visits live interfaces in registration order and skips those
//! whose [`Capabilities`] do not cover the event.

pub mod absorbing;
pub mod coupling;
pub mod export;

pub use absorbing::{AbsorbingLayer, AbsorbingLayerReport};
pub use coupling::CouplingInterface;
pub use export::{ExportRecord, ExportWriter, RecordWriter};

use std::any::Any;
use std::fmt;
use std::ops::BitOr;

use crate::data::mesh::Mesh;
use crate::data::properties::PropertyLibrary;
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::topology::ownership::CoreMap;

/// What an interface owns or reacts to.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    pub const OWNS_MESH: Capabilities = Capabilities(1);
    pub const OWNS_NODES: Capabilities = Capabilities(1 << 1);
    pub const OWNS_CONSTRAINTS: Capabilities = Capabilities(1 << 2);
    pub const REACTS_TO_REPARTITION: Capabilities = Capabilities(1 << 3);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every flag of `other` is set.
    #[inline]
    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag of `other` is set.
    #[inline]
    pub const fn intersects(self, other: Capabilities) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Self) -> Self {
        Capabilities(self.0 | rhs.0)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Capabilities::OWNS_MESH, "OWNS_MESH"),
            (Capabilities::OWNS_NODES, "OWNS_NODES"),
            (Capabilities::OWNS_CONSTRAINTS, "OWNS_CONSTRAINTS"),
            (Capabilities::REACTS_TO_REPARTITION, "REACTS_TO_REPARTITION"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|&(_, name)| name)
            .collect();
        if set.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&set.join(" | "))
        }
    }
}

/// Lifecycle events raised by the assembler and the session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InterfaceEvent {
    PostAssemble,
    ResolveCoreConflicts,
    PreExport,
}

impl InterfaceEvent {
    /// An interface receives the event if its capabilities intersect this
    /// set. `NONE` means every interface receives it.
    pub fn audience(self) -> Capabilities {
        match self {
            InterfaceEvent::PostAssemble => {
                Capabilities::OWNS_MESH | Capabilities::OWNS_NODES | Capabilities::OWNS_CONSTRAINTS
            }
            InterfaceEvent::ResolveCoreConflicts => Capabilities::REACTS_TO_REPARTITION,
            InterfaceEvent::PreExport => Capabilities::NONE,
        }
    }

    /// Whether an interface with `caps` takes part in this event.
    pub fn reaches(self, caps: Capabilities) -> bool {
        let audience = self.audience();
        audience == Capabilities::NONE || caps.intersects(audience)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InterfaceEvent::PostAssemble => "POST_ASSEMBLE",
            InterfaceEvent::ResolveCoreConflicts => "RESOLVE_CORE_CONFLICTS",
            InterfaceEvent::PreExport => "PRE_EXPORT",
        }
    }
}

/// Mutable state handed to `on_post_assemble`.
pub struct AssemblyContext<'a> {
    pub mesh: &'a mut Mesh,
    pub properties: &'a mut PropertyLibrary,
    /// Merge tolerance of the assembler, also used for `PointKey` quantization.
    pub tolerance: f64,
}

/// Object-safe cloning, so registries can be staged and swapped.
pub trait InterfaceClone {
    fn clone_box(&self) -> Box<dyn Interface>;
}

impl<T> InterfaceClone for T
where
    T: Interface + Clone + 'static,
{
    fn clone_box(&self) -> Box<dyn Interface> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Interface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A registered participant in the assembly lifecycle.
///
/// Callbacks must be idempotent: running `on_post_assemble` again on a
/// rebuilt mesh replaces, never duplicates, what the previous run created.
pub trait Interface: InterfaceClone + fmt::Debug + Any {
    /// Stable, registry-unique name.
    fn name(&self) -> &str;

    /// Mesh parts (fragment or interface names) this interface attaches to.
    fn owners(&self) -> &[String];

    fn capabilities(&self) -> Capabilities;

    fn on_post_assemble(&mut self, _ctx: &mut AssemblyContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_resolve_core_conflicts(&mut self, _mesh: &Mesh, _core_map: &CoreMap) -> Result<()> {
        Ok(())
    }

    fn on_pre_export(&self, _mesh: &Mesh, _writer: &mut dyn ExportWriter) -> Result<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

/// Handle to a registered interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(usize);

impl InterfaceId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interface #{}", self.0)
    }
}

/// Arena of interfaces in registration order. Slots are never reused.
#[derive(Clone, Debug, Default)]
pub struct InterfaceRegistry {
    slots: Vec<Option<Box<dyn Interface>>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `interface` and returns its handle.
    ///
    /// # Errors
    /// `Validation` for an empty name or a name already registered.
    pub fn register(&mut self, interface: Box<dyn Interface>) -> Result<InterfaceId> {
        let name = interface.name();
        if name.is_empty() {
            return Err(MeshAssemblyError::validation("interface registration", "name must not be empty"));
        }
        if self.find(name).is_some() {
            return Err(MeshAssemblyError::validation(
                "interface registration",
                format!("an interface named `{name}` is already registered"),
            ));
        }
        let id = InterfaceId(self.slots.len());
        log::debug!("registered {id} `{name}` ({:?})", interface.capabilities());
        self.slots.push(Some(interface));
        Ok(id)
    }

    /// Removes and returns the interface behind `id`.
    pub fn unregister(&mut self, id: InterfaceId) -> Option<Box<dyn Interface>> {
        let removed = self.slots.get_mut(id.0).and_then(Option::take);
        if let Some(iface) = &removed {
            log::debug!("unregistered {id} `{}`", iface.name());
        }
        removed
    }

    pub fn contains(&self, id: InterfaceId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: InterfaceId) -> Option<&dyn Interface> {
        self.slots.get(id.0).and_then(|s| s.as_deref())
    }

    /// Downcasts the interface behind `id`.
    pub fn get_as<T: Interface>(&self, id: InterfaceId) -> Option<&T> {
        self.get(id).and_then(|i| i.as_any().downcast_ref::<T>())
    }

    /// Looks an interface up by name.
    pub fn find(&self, name: &str) -> Option<InterfaceId> {
        self.iter().find(|(_, i)| i.name() == name).map(|(id, _)| id)
    }

    /// Number of live interfaces.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever allocated, live or not.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Live interfaces in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (InterfaceId, &dyn Interface)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_deref().map(|iface| (InterfaceId(i), iface)))
    }

    fn live_mut(&mut self) -> impl Iterator<Item = (InterfaceId, &mut Box<dyn Interface>)> + '_ {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|iface| (InterfaceId(i), iface)))
    }

    /// Fires `POST_ASSEMBLE` on every interface that owns mesh artifacts.
    pub fn dispatch_post_assemble(&mut self, ctx: &mut AssemblyContext<'_>) -> Result<()> {
        for (id, iface) in self.live_mut() {
            if InterfaceEvent::PostAssemble.reaches(iface.capabilities()) {
                log::debug!("{} -> {id} `{}`", InterfaceEvent::PostAssemble.as_str(), iface.name());
                iface.on_post_assemble(ctx)?;
            }
        }
        Ok(())
    }

    /// Fires `RESOLVE_CORE_CONFLICTS` on every interface that reacts to repartitioning.
    pub fn dispatch_resolve_core_conflicts(&mut self, mesh: &Mesh, core_map: &CoreMap) -> Result<()> {
        for (id, iface) in self.live_mut() {
            if InterfaceEvent::ResolveCoreConflicts.reaches(iface.capabilities()) {
                log::debug!("{} -> {id} `{}`", InterfaceEvent::ResolveCoreConflicts.as_str(), iface.name());
                iface.on_resolve_core_conflicts(mesh, core_map)?;
            }
        }
        Ok(())
    }

    /// Fires `PRE_EXPORT` on every interface.
    pub fn dispatch_pre_export(&self, mesh: &Mesh, writer: &mut dyn ExportWriter) -> Result<()> {
        for (id, iface) in self.iter() {
            if InterfaceEvent::PreExport.reaches(iface.capabilities()) {
                log::debug!("{} -> {id} `{}`", InterfaceEvent::PreExport.as_str(), iface.name());
                iface.on_pre_export(mesh, writer)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every callback into a shared journal.
    #[derive(Clone, Debug)]
    struct Probe {
        name: String,
        owners: Vec<String>,
        caps: Capabilities,
        journal: Rc<RefCell<Vec<String>>>,
    }

    impl Probe {
        fn boxed(name: &str, caps: Capabilities, journal: &Rc<RefCell<Vec<String>>>) -> Box<dyn Interface> {
            Box::new(Probe {
                name: name.into(),
                owners: Vec::new(),
                caps,
                journal: Rc::clone(journal),
            })
        }
    }

    impl Interface for Probe {
        fn name(&self) -> &str {
            &self.name
        }
        fn owners(&self) -> &[String] {
            &self.owners
        }
        fn capabilities(&self) -> Capabilities {
            self.caps
        }
        fn on_post_assemble(&mut self, _ctx: &mut AssemblyContext<'_>) -> Result<()> {
            self.journal.borrow_mut().push(format!("post:{}", self.name));
            Ok(())
        }
        fn on_resolve_core_conflicts(&mut self, _mesh: &Mesh, _map: &CoreMap) -> Result<()> {
            self.journal.borrow_mut().push(format!("resolve:{}", self.name));
            Ok(())
        }
        fn on_pre_export(&self, _mesh: &Mesh, _w: &mut dyn ExportWriter) -> Result<()> {
            self.journal.borrow_mut().push(format!("export:{}", self.name));
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn dispatch_follows_registration_order_and_capabilities() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut reg = InterfaceRegistry::new();
        reg.register(Probe::boxed("a", Capabilities::OWNS_CONSTRAINTS, &journal)).unwrap();
        reg.register(Probe::boxed("b", Capabilities::REACTS_TO_REPARTITION, &journal)).unwrap();
        reg.register(
            Probe::boxed("c", Capabilities::OWNS_MESH | Capabilities::REACTS_TO_REPARTITION, &journal),
        )
        .unwrap();

        let mut mesh = Mesh::with_cores();
        let mut props = PropertyLibrary::new();
        let mut ctx = AssemblyContext {
            mesh: &mut mesh,
            properties: &mut props,
            tolerance: 1e-6,
        };
        reg.dispatch_post_assemble(&mut ctx).unwrap();
        let map = CoreMap::from_mesh(&mesh).unwrap();
        reg.dispatch_resolve_core_conflicts(&mesh, &map).unwrap();
        let mut sink = RecordWriter::new();
        reg.dispatch_pre_export(&mesh, &mut sink).unwrap();

        assert_eq!(
            *journal.borrow(),
            vec!["post:a", "post:c", "resolve:b", "resolve:c", "export:a", "export:b", "export:c"]
        );
    }

    #[test]
    fn stale_ids_resolve_to_none() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut reg = InterfaceRegistry::new();
        let a = reg.register(Probe::boxed("a", Capabilities::OWNS_MESH, &journal)).unwrap();
        let b = reg.register(Probe::boxed("b", Capabilities::OWNS_MESH, &journal)).unwrap();
        assert!(reg.unregister(a).is_some());
        assert!(reg.unregister(a).is_none());
        assert!(!reg.contains(a));
        assert_eq!(reg.get_as::<Probe>(b).map(|p| p.name.as_str()), Some("b"));
        // Slots are not reused.
        let c = reg.register(Probe::boxed("a", Capabilities::OWNS_MESH, &journal)).unwrap();
        assert_ne!(c, a);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.slot_count(), 3);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut reg = InterfaceRegistry::new();
        reg.register(Probe::boxed("x", Capabilities::NONE, &journal)).unwrap();
        let err = reg.register(Probe::boxed("x", Capabilities::NONE, &journal)).unwrap_err();
        assert_eq!(err.kind(), crate::mesh_error::ErrorKind::Validation);
    }

    #[test]
    fn capability_debug_lists_flags() {
        let caps = Capabilities::OWNS_NODES | Capabilities::REACTS_TO_REPARTITION;
        assert_eq!(format!("{caps:?}"), "OWNS_NODES | REACTS_TO_REPARTITION");
        assert_eq!(format!("{:?}", Capabilities::NONE), "NONE");
        assert!(caps.contains(Capabilities::OWNS_NODES));
        assert!(!caps.intersects(Capabilities::OWNS_MESH));
    }
}
