//! Per-run workspace tying fragments, properties, assembly and interfaces together.
//!
//! A [`Session`] is created once per model and passed around by reference;
//! there is no global state. Every mutating call stages its work and commits
//! only on success.

use crate::config::{AbsorbingLayerParams, AssemblerConfig};
use crate::assembly::{Assembler, AssemblySection};
use crate::data::fragment::{FragmentData, FragmentStore};
use crate::data::mesh::Mesh;
use crate::data::properties::PropertyLibrary;
use crate::interface::{
    AbsorbingLayer, AssemblyContext, CouplingInterface, ExportWriter, Interface, InterfaceEvent, InterfaceId,
    InterfaceRegistry,
};
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::partitioning::PartitionAlgorithm;
use crate::topology::ownership::CoreMap;

#[derive(Clone, Debug, Default)]
pub struct Session {
    fragments: FragmentStore,
    properties: PropertyLibrary,
    assembler: Assembler,
    interfaces: InterfaceRegistry,
}

impl Session {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            assembler: Assembler::new(config),
            ..Self::default()
        }
    }

    pub fn fragments(&self) -> &FragmentStore {
        &self.fragments
    }

    pub fn properties(&self) -> &PropertyLibrary {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertyLibrary {
        &mut self.properties
    }

    pub fn assembler(&self) -> &Assembler {
        &self.assembler
    }

    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.interfaces
    }

    /// The committed global mesh, once assembled.
    pub fn mesh(&self) -> Option<&Mesh> {
        self.assembler.mesh()
    }

    /// Validates and stores a fragment.
    pub fn add_fragment(&mut self, name: impl Into<String>, data: FragmentData) -> Result<()> {
        self.fragments.add(name, data)
    }

    pub fn create_section(
        &mut self,
        fragments: &[&str],
        num_partitions: usize,
        algorithm: Option<PartitionAlgorithm>,
        merge_points: bool,
    ) -> Result<usize> {
        self.assembler
            .create_section(&self.fragments, fragments, num_partitions, algorithm, merge_points)
    }

    pub fn remove_section(&mut self, tag: usize) -> Result<AssemblySection> {
        self.assembler.remove_section(tag)
    }

    /// Builds the global mesh from all sections and replays every interface.
    pub fn assemble(&mut self, merge_points: bool) -> Result<&Mesh> {
        self.assembler
            .assemble(&self.fragments, &mut self.properties, &mut self.interfaces, merge_points)
    }

    /// Wraps the assembled mesh in absorbing layers.
    ///
    /// Each call adds a new interface that extrudes from the current
    /// exterior, so repeated calls stack layers outward.
    pub fn add_absorbing_layer(&mut self, params: AbsorbingLayerParams) -> Result<InterfaceId> {
        if self.mesh().is_none() {
            return Err(MeshAssemblyError::validation(
                "absorbing layer",
                "the mesh must be assembled before adding absorbing layers",
            ));
        }
        let name = (self.interfaces.slot_count() + 1..)
            .map(|n| format!("absorbing_layer_{n}"))
            .find(|name| self.interfaces.find(name).is_none())
            .ok_or_else(|| MeshAssemblyError::validation("absorbing layer", "no free layer name"))?;
        self.attach(Box::new(AbsorbingLayer::new(name, params)?))
    }

    /// Ties coincident nodes between the cells of two fragments.
    pub fn add_coupling(&mut self, name: &str, master: &str, slave: &str) -> Result<InterfaceId> {
        self.attach(Box::new(CouplingInterface::new(name, master, slave)?))
    }

    /// Registers `interface`; if a mesh is already assembled the interface
    /// immediately receives `POST_ASSEMBLE`, and every interface reacting to
    /// repartitioning (the new one included) gets `RESOLVE_CORE_CONFLICTS`
    /// against the resulting core layout.
    pub fn attach(&mut self, mut interface: Box<dyn Interface>) -> Result<InterfaceId> {
        if self.interfaces.find(interface.name()).is_some() {
            return Err(MeshAssemblyError::validation(
                "interface registration",
                format!("an interface named `{}` is already registered", interface.name()),
            ));
        }
        let Some(mesh) = self.assembler.mesh() else {
            return self.interfaces.register(interface);
        };
        let mut staged = mesh.clone();
        let mut properties = self.properties.clone();
        if InterfaceEvent::PostAssemble.reaches(interface.capabilities()) {
            interface.on_post_assemble(&mut AssemblyContext {
                mesh: &mut staged,
                properties: &mut properties,
                tolerance: self.assembler.config().merge_tolerance,
            })?;
        }
        // The new interface may have added cores the others have not seen.
        let mut interfaces = self.interfaces.clone();
        let id = interfaces.register(interface)?;
        let core_map = CoreMap::from_mesh(&staged)?;
        interfaces.dispatch_resolve_core_conflicts(&staged, &core_map)?;

        self.assembler.replace_mesh(staged);
        self.properties = properties;
        self.interfaces = interfaces;
        Ok(id)
    }

    /// Drops an interface. Artifacts it added to the mesh disappear at the
    /// next `assemble`.
    pub fn detach(&mut self, id: InterfaceId) -> Option<Box<dyn Interface>> {
        self.interfaces.unregister(id)
    }

    /// Downcasts a registered interface.
    pub fn interface<T: Interface>(&self, id: InterfaceId) -> Option<&T> {
        self.interfaces.get_as::<T>(id)
    }

    /// Fires `PRE_EXPORT`, letting every interface append its records.
    pub fn export(&self, writer: &mut dyn ExportWriter) -> Result<()> {
        let mesh = self
            .mesh()
            .ok_or_else(|| MeshAssemblyError::validation("export", "nothing assembled yet"))?;
        self.interfaces.dispatch_pre_export(mesh, writer)
    }
}
