//! Mesh containers, fragment input, property records and constraints.

pub mod constraints;
pub mod fragment;
pub mod mesh;
pub mod properties;

pub use constraints::{ConstraintSet, CorePlacement, DofMask, EqualDofConstraint};
pub use fragment::{FragmentData, FragmentStore, MeshFragment};
pub use mesh::{CellSpec, Mesh};
pub use properties::PropertyLibrary;
