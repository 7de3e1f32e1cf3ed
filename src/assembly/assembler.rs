//! The Assembler: owns the sections and the global mesh.
//!
//! `assemble` runs the whole pipeline on staged copies:
//! 1. build and partition every section,
//! 2. concatenate them, offsetting each section's `Core` ids by the
//!    partition counts of the sections before it,
//! 3. optionally merge coincident points across sections,
//! 4. fire `POST_ASSEMBLE`, then `RESOLVE_CORE_CONFLICTS` with the final
//!    [`CoreMap`].
//!
//! Only when every step succeeds are the sections, the global mesh, the
//! property library and the interface registry replaced.

use crate::algs::merge::merge_points;
use crate::assembly::section::AssemblySection;
use crate::config::AssemblerConfig;
use crate::data::fragment::FragmentStore;
use crate::data::mesh::Mesh;
use crate::data::properties::PropertyLibrary;
use crate::debug_invariants::DebugInvariants;
use crate::interface::{AssemblyContext, InterfaceRegistry};
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::partitioning::PartitionAlgorithm;
use crate::topology::ownership::CoreMap;

#[derive(Clone, Debug, Default)]
pub struct Assembler {
    config: AssemblerConfig,
    sections: Vec<AssemblySection>,
    mesh: Option<Mesh>,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            sections: Vec::new(),
            mesh: None,
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Sections in tag order (tag = index + 1).
    pub fn sections(&self) -> &[AssemblySection] {
        &self.sections
    }

    pub fn section(&self, tag: usize) -> Option<&AssemblySection> {
        tag.checked_sub(1).and_then(|i| self.sections.get(i))
    }

    pub fn section_mut(&mut self, tag: usize) -> Option<&mut AssemblySection> {
        tag.checked_sub(1).and_then(move |i| self.sections.get_mut(i))
    }

    /// The committed global mesh.
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub(crate) fn replace_mesh(&mut self, mesh: Mesh) {
        self.mesh = Some(mesh);
    }

    /// Registers a section over `fragments` and returns its tag.
    ///
    /// `algorithm = None` uses the configured default.
    ///
    /// # Errors
    /// `Validation` for an empty list, unknown fragments, and fragments that
    /// already belong to another section.
    pub fn create_section(
        &mut self,
        store: &FragmentStore,
        fragments: &[&str],
        num_partitions: usize,
        algorithm: Option<PartitionAlgorithm>,
        merge_points: bool,
    ) -> Result<usize> {
        let tag = self.sections.len() + 1;
        let context = format!("section {tag}");
        for name in fragments {
            store.require(name, &context)?;
            if let Some(other) = self
                .sections
                .iter()
                .find(|s| s.fragments().iter().any(|f| f == name))
            {
                return Err(MeshAssemblyError::validation(
                    &context,
                    format!("fragment `{name}` already belongs to section {}", other.tag()),
                ));
            }
        }
        let section = AssemblySection::new(
            tag,
            fragments.iter().map(|s| s.to_string()).collect(),
            num_partitions,
            algorithm.unwrap_or(self.config.default_partition_algorithm),
            merge_points,
        )?;
        log::debug!("created section {tag} over {fragments:?}");
        self.sections.push(section);
        Ok(tag)
    }

    /// Removes section `tag`; later sections shift down to keep tags contiguous.
    pub fn remove_section(&mut self, tag: usize) -> Result<AssemblySection> {
        if tag == 0 || tag > self.sections.len() {
            return Err(MeshAssemblyError::validation(
                format!("section {tag}"),
                format!("no such section ({} defined)", self.sections.len()),
            ));
        }
        let removed = self.sections.remove(tag - 1);
        for (i, s) in self.sections.iter_mut().enumerate() {
            s.set_tag(i + 1);
        }
        Ok(removed)
    }

    /// Rebuilds the global mesh and replays every interface.
    pub fn assemble(
        &mut self,
        store: &FragmentStore,
        properties: &mut PropertyLibrary,
        interfaces: &mut InterfaceRegistry,
        merge: bool,
    ) -> Result<&Mesh> {
        if self.sections.is_empty() {
            return Err(MeshAssemblyError::validation("assemble", "no sections to assemble"));
        }
        let tol = self.config.merge_tolerance;

        let staged_sections = self
            .sections
            .iter()
            .map(|s| s.stage(store, tol))
            .collect::<Result<Vec<Mesh>>>()?;

        let mut global = Mesh::with_cores();
        let mut offset = 0;
        for (section, mesh) in self.sections.iter().zip(&staged_sections) {
            global.append(mesh, Some(offset))?;
            offset += section.partition_count();
        }
        if merge {
            global = merge_points(&global, tol, "global assembly")?.0;
        }

        let mut staged_properties = properties.clone();
        let mut staged_interfaces = interfaces.clone();
        staged_interfaces.dispatch_post_assemble(&mut AssemblyContext {
            mesh: &mut global,
            properties: &mut staged_properties,
            tolerance: tol,
        })?;
        let core_map = CoreMap::from_mesh(&global)?;
        staged_interfaces.dispatch_resolve_core_conflicts(&global, &core_map)?;
        global.debug_assert_invariants();

        log::info!(
            "assembled {} section(s): {} cells, {} points, {} cores",
            self.sections.len(),
            global.num_cells(),
            global.num_points(),
            core_map.num_cores()
        );
        for (section, mesh) in self.sections.iter_mut().zip(staged_sections) {
            section.commit(mesh);
        }
        *properties = staged_properties;
        *interfaces = staged_interfaces;
        Ok(&*self.mesh.insert(global))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::meshgen::{BoxOptions, structured_box};
    use crate::mesh_error::ErrorKind;

    fn store() -> FragmentStore {
        let mut store = FragmentStore::new();
        for (name, x0) in [("a", 0.0), ("b", 1.0), ("c", 2.0)] {
            let data = structured_box([2, 2, 2], [x0, 0.0, 0.0], [x0 + 1.0, 1.0, 1.0], BoxOptions::default()).unwrap();
            store.add(name, data).unwrap();
        }
        store
    }

    fn assemble(asm: &mut Assembler, store: &FragmentStore, merge: bool) -> Result<Mesh> {
        let mut props = PropertyLibrary::new();
        let mut ifaces = InterfaceRegistry::new();
        asm.assemble(store, &mut props, &mut ifaces, merge).cloned()
    }

    #[test]
    fn core_ids_are_offset_per_section() {
        let store = store();
        let mut asm = Assembler::default();
        asm.create_section(&store, &["a"], 2, None, true).unwrap();
        asm.create_section(&store, &["b"], 0, None, true).unwrap();
        asm.create_section(&store, &["c"], 3, None, true).unwrap();
        let mesh = assemble(&mut asm, &store, true).unwrap();
        let core = mesh.core().unwrap();
        let a: Vec<usize> = core[..8].to_vec();
        assert!(a.iter().all(|&c| c < 2));
        assert!(core[8..16].iter().all(|&c| c == 2));
        assert!(core[16..].iter().all(|&c| (3..7).contains(&c)));
        assert_eq!(core.iter().max(), Some(&6));
        // Sections merge pairwise along x = 1 and x = 2.
        assert_eq!(mesh.num_points(), 3 * 27 - 2 * 9);
    }

    #[test]
    fn global_merge_can_be_disabled() {
        let store = store();
        let mut asm = Assembler::default();
        asm.create_section(&store, &["a"], 0, None, true).unwrap();
        asm.create_section(&store, &["b"], 0, None, true).unwrap();
        let mesh = assemble(&mut asm, &store, false).unwrap();
        assert_eq!(mesh.num_points(), 2 * 27);
    }

    #[test]
    fn fragments_belong_to_one_section() {
        let store = store();
        let mut asm = Assembler::default();
        asm.create_section(&store, &["a", "b"], 0, None, true).unwrap();
        let err = asm.create_section(&store, &["b"], 0, None, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = asm.create_section(&store, &["zzz"], 0, None, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn removal_resequences_tags() {
        let store = store();
        let mut asm = Assembler::default();
        for name in ["a", "b", "c"] {
            asm.create_section(&store, &[name], 0, None, true).unwrap();
        }
        let removed = asm.remove_section(2).unwrap();
        assert_eq!(removed.fragments(), ["b".to_string()]);
        let tags: Vec<usize> = asm.sections().iter().map(|s| s.tag()).collect();
        assert_eq!(tags, vec![1, 2]);
        assert_eq!(asm.section(2).unwrap().fragments(), ["c".to_string()]);
        assert!(asm.remove_section(3).is_err());
        assert!(asm.remove_section(0).is_err());
    }

    #[test]
    fn failed_assembly_keeps_committed_mesh() {
        let store = store();
        let mut asm = Assembler::default();
        asm.create_section(&store, &["a"], 0, None, true).unwrap();
        let first = assemble(&mut asm, &store, true).unwrap();
        asm.create_section(&store, &["b"], 64, None, true).unwrap();
        let err = assemble(&mut asm, &store, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Partition);
        assert_eq!(asm.mesh(), Some(&first));
        assert!(!asm.section(2).unwrap().is_built());
    }

    #[test]
    fn empty_assembler_cannot_assemble() {
        let store = store();
        let mut asm = Assembler::default();
        assert!(assemble(&mut asm, &store, true).is_err());
    }
}
