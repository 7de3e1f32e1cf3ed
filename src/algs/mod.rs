//! Re-export public algorithms.

pub mod boundary;
pub mod extrude;
pub mod merge;
pub mod meshgen;

pub use boundary::{BoxClassification, BoxSide, ExteriorFace, classify_rectangular, exterior_faces};
pub use extrude::{ShellExtrusion, extrude_shell};
pub use merge::{MergeStats, coincident_point_map, merge_points};
pub use meshgen::{BoxOptions, StructuredCellType, structured_box};
