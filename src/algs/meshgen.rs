//! Structured box fragments for tests, benches and quick models.

use crate::data::fragment::FragmentData;
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::topology::cell_type::CellType;

/// Cell-type choices for structured boxes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StructuredCellType {
    #[default]
    Hexahedron,
    /// Each hexahedron split into two wedges along its `v0-v2` diagonal.
    Prism,
}

/// Tags and DOF count stamped on every generated cell and point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxOptions {
    pub cell_type: StructuredCellType,
    pub element_tag: u32,
    pub material_tag: u32,
    pub region: u32,
    pub ndf: u8,
}

impl Default for BoxOptions {
    fn default() -> Self {
        Self {
            cell_type: StructuredCellType::Hexahedron,
            element_tag: 1,
            material_tag: 1,
            region: 0,
            ndf: 3,
        }
    }
}

/// Generate a structured box over `[min, max]` with `n[0]`×`n[1]`×`n[2]` cells.
///
/// Points are numbered x fastest, then y, then z.
pub fn structured_box(
    n: [usize; 3],
    min: [f64; 3],
    max: [f64; 3],
    options: BoxOptions,
) -> Result<FragmentData> {
    let [nx, ny, nz] = n;
    if nx == 0 || ny == 0 || nz == 0 {
        return Err(MeshAssemblyError::validation(
            "structured box",
            "nx, ny, and nz must be positive",
        ));
    }
    if (0..3).any(|k| !(max[k] > min[k])) {
        return Err(MeshAssemblyError::validation(
            "structured box",
            format!("max {max:?} must exceed min {min:?} on every axis"),
        ));
    }

    let dx = (max[0] - min[0]) / nx as f64;
    let dy = (max[1] - min[1]) / ny as f64;
    let dz = (max[2] - min[2]) / nz as f64;
    let mut points = Vec::with_capacity((nx + 1) * (ny + 1) * (nz + 1));
    for k in 0..=nz {
        let z = min[2] + dz * k as f64;
        for j in 0..=ny {
            let y = min[1] + dy * j as f64;
            for i in 0..=nx {
                points.push([min[0] + dx * i as f64, y, z]);
            }
        }
    }

    let mut cells = Vec::new();
    let mut cell_types = Vec::new();
    let row_stride = nx + 1;
    let slab_stride = row_stride * (ny + 1);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let v0 = k * slab_stride + j * row_stride + i;
                let v1 = v0 + 1;
                let v3 = v0 + row_stride;
                let v2 = v3 + 1;
                let v4 = v0 + slab_stride;
                let v5 = v4 + 1;
                let v7 = v4 + row_stride;
                let v6 = v7 + 1;
                match options.cell_type {
                    StructuredCellType::Hexahedron => {
                        cells.push(vec![v0, v1, v2, v3, v4, v5, v6, v7]);
                        cell_types.push(CellType::Hexahedron);
                    }
                    StructuredCellType::Prism => {
                        // Wedge bases wind clockwise seen from the top.
                        cells.push(vec![v0, v2, v1, v4, v6, v5]);
                        cells.push(vec![v0, v3, v2, v4, v7, v6]);
                        cell_types.extend([CellType::Prism; 2]);
                    }
                }
            }
        }
    }

    let n_cells = cells.len();
    Ok(FragmentData {
        ndf: vec![options.ndf; points.len()],
        points,
        cells,
        cell_types,
        element_tag: vec![options.element_tag; n_cells],
        material_tag: vec![options.material_tag; n_cells],
        region: vec![options.region; n_cells],
    })
}
