#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-assembly
//!
//! mesh-assembly turns independently generated finite-element mesh fragments
//! into one partitioned global mesh, ready for a distributed solver.
//!
//! ## Pipeline
//! - Fragments are validated once ([`data::fragment::MeshFragment`]) and
//!   grouped into assembly sections.
//! - Each section merges coincident points and is split into `Core`
//!   partitions by recursive coordinate bisection.
//! - The [`assembly::Assembler`] concatenates the sections, keeps their `Core`
//!   ids disjoint, and optionally merges points across sections.
//! - Registered interfaces then react to the finished mesh: absorbing layers
//!   (PML or Rayleigh) extrude around the exterior, coupling interfaces tie
//!   coincident nodes, and both place their constraints on cores.
//!
//! ## Determinism
//!
//! No step depends on hash iteration order or randomness: merges keep the
//! lowest-indexed point, partition ties break on cell index, and every
//! keyed collection that is iterated is a `BTreeMap`. Assembling the same
//! inputs twice yields identical meshes, tags and `Core` arrays.
//!
//! ## Usage
//! ```rust
//! # fn try_main() -> Result<(), mesh_assembly::mesh_error::MeshAssemblyError> {
//! use mesh_assembly::prelude::*;
//!
//! let mut session = Session::new(AssemblerConfig::default());
//! session.add_fragment("cube", structured_box([2, 2, 2], [0.0; 3], [1.0; 3], BoxOptions::default())?)?;
//! session.create_section(&["cube"], 2, None, true)?;
//! let mesh = session.assemble(true)?;
//! assert_eq!(mesh.num_cells(), 8);
//!
//! let layer = AbsorbingLayerParams::from_names(1, 0, "kd-tree", "Rectangular", "Rayleigh", 0.05, false)?;
//! # session.properties_mut().add_element(1, ElementRecord::standard("brick", "stdBrick", 3))?;
//! # session.properties_mut().add_material(1, MaterialRecord::elastic_isotropic("soil", 2e8, 0.3, 2000.0))?;
//! session.add_absorbing_layer(layer)?;
//! assert_eq!(session.mesh().map(|m| m.num_cells()), Some(8 + 24));
//! # Ok(())
//! # }
//! # try_main().unwrap();
//! ```

pub mod algs;
pub mod assembly;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod interface;
pub mod mesh_error;
pub mod partitioning;
pub mod session;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::meshgen::{BoxOptions, StructuredCellType, structured_box};
    pub use crate::assembly::{Assembler, AssemblySection};
    pub use crate::config::{
        AbsorbingLayerOptions, AbsorbingLayerParams, AssemblerConfig, DampingModel, LayerGeometry, PmlOptions,
    };
    pub use crate::data::constraints::{ConstraintSet, DofMask, EqualDofConstraint};
    pub use crate::data::fragment::{FragmentData, FragmentStore, MeshFragment};
    pub use crate::data::mesh::Mesh;
    pub use crate::data::properties::{
        ElementRecord, MaterialRecord, PropertyLibrary, RayleighDamping, RegionRecord,
    };
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::interface::{
        AbsorbingLayer, Capabilities, CouplingInterface, ExportRecord, ExportWriter, Interface,
        InterfaceId, InterfaceRegistry, RecordWriter,
    };
    pub use crate::mesh_error::{ErrorKind, MeshAssemblyError};
    pub use crate::partitioning::PartitionAlgorithm;
    pub use crate::session::Session;
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::ownership::CoreMap;
    pub use crate::topology::point::PointKey;
}
