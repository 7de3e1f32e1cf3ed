//! Cell type metadata for mesh cells.
//!
//! Vertex ordering follows the VTK conventions, so fragments produced by
//! external mesh generators can be handed over without reordering.

use serde::{Deserialize, Serialize};

/// Volume and surface cell types understood by the assembler.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellType {
    /// 2D simplex (triangle).
    Triangle,
    /// 2D tensor-product cell (quad).
    Quadrilateral,
    /// 3D simplex (tet).
    Tetrahedron,
    /// 3D tensor-product cell (hex).
    #[default]
    Hexahedron,
    /// 3D wedge/prism.
    Prism,
    /// 3D pyramid.
    Pyramid,
}

const HEX_FACES: [&[usize]; 6] = [
    &[0, 3, 2, 1],
    &[4, 5, 6, 7],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[3, 0, 4, 7],
];
const TET_FACES: [&[usize]; 4] = [&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const PRISM_FACES: [&[usize]; 5] = [
    &[0, 1, 2],
    &[3, 5, 4],
    &[0, 3, 4, 1],
    &[1, 4, 5, 2],
    &[2, 5, 3, 0],
];
const PYRAMID_FACES: [&[usize]; 5] = [&[0, 3, 2, 1], &[0, 1, 4], &[1, 2, 4], &[2, 3, 4], &[3, 0, 4]];

impl CellType {
    /// Returns the topological dimension of the cell.
    pub fn dimension(self) -> u8 {
        match self {
            CellType::Triangle | CellType::Quadrilateral => 2,
            CellType::Tetrahedron | CellType::Hexahedron | CellType::Prism | CellType::Pyramid => 3,
        }
    }

    /// Number of vertices in the cell connectivity.
    pub fn vertex_count(self) -> usize {
        match self {
            CellType::Triangle => 3,
            CellType::Quadrilateral | CellType::Tetrahedron => 4,
            CellType::Pyramid => 5,
            CellType::Prism => 6,
            CellType::Hexahedron => 8,
        }
    }

    /// Local vertex indices of each face, ordered so the right-hand normal
    /// points out of the cell. Surface cells have no faces.
    pub fn faces(self) -> &'static [&'static [usize]] {
        match self {
            CellType::Hexahedron => &HEX_FACES,
            CellType::Tetrahedron => &TET_FACES,
            CellType::Prism => &PRISM_FACES,
            CellType::Pyramid => &PYRAMID_FACES,
            CellType::Triangle | CellType::Quadrilateral => &[],
        }
    }

    /// Volume cell produced by sweeping a face with `n` vertices along its normal.
    pub fn extruded_from_face(n: usize) -> Option<CellType> {
        match n {
            3 => Some(CellType::Prism),
            4 => Some(CellType::Hexahedron),
            _ => None,
        }
    }
}
