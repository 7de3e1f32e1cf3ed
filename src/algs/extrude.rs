//! Extrude the exterior of a box-shaped mesh into concentric shell layers.
//!
//! # Expected face types
//! - Triangular exterior faces extrude to [`CellType::Prism`] volumes.
//! - Quadrilateral exterior faces extrude to [`CellType::Hexahedron`] volumes.
//!
//! Every exterior vertex moves by `thickness` along each non-zero axis of its
//! box signature, so face vertices move along the side normal, edge vertices
//! diagonally and corners along the space diagonal. The outer surface of each
//! layer is therefore again an axis-aligned box and the next layer extrudes
//! from it the same way. Each layer holds exactly one cell per exterior face.
//!
//! The plan is computed against an immutable mesh; callers append
//! [`ShellExtrusion::points`] and [`ShellExtrusion::cells`] in order, so the
//! point indices stored in the cells are final.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use hashbrown::HashMap;
use itertools::Itertools;

use crate::algs::boundary::{BoxClassification, BoxSide, Signature};
use crate::data::mesh::Mesh;
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::topology::cell_type::CellType;

/// A point created by the extrusion.
#[derive(Clone, Debug, PartialEq)]
pub struct ShellPoint {
    pub xyz: [f64; 3],
    pub ndf: u8,
    /// Interior mesh vertex this point descends from.
    pub origin: usize,
}

/// A volume cell created by the extrusion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellCell {
    /// Zero-based layer index within this extrusion.
    pub layer: usize,
    pub cell_type: CellType,
    pub vertices: Vec<usize>,
    /// Interior cell whose exterior face seeded this column of cells.
    pub interior_cell: usize,
    pub side: BoxSide,
}

/// The full extrusion plan.
#[derive(Clone, Debug, Default)]
pub struct ShellExtrusion {
    /// Index the first new point receives when appended to the mesh.
    pub base: usize,
    pub thickness: f64,
    pub num_layers: usize,
    pub points: Vec<ShellPoint>,
    /// Cells ordered by layer, then by seeding face.
    pub cells: Vec<ShellCell>,
    /// `(interior vertex, layer vertex)` pairs duplicated because their
    /// DOF counts differ. They need equal-DOF constraints.
    pub interface_pairs: Vec<(usize, usize)>,
}

impl ShellExtrusion {
    /// Coordinates of `p`, which may be an existing or a planned point.
    pub fn position(&self, mesh: &Mesh, p: usize) -> [f64; 3] {
        if p < self.base {
            mesh.point(p)
        } else {
            self.points[p - self.base].xyz
        }
    }

    fn ndf(&self, mesh: &Mesh, p: usize) -> u8 {
        if p < self.base {
            mesh.ndf(p)
        } else {
            self.points[p - self.base].ndf
        }
    }

    fn origin(&self, p: usize) -> usize {
        if p < self.base {
            p
        } else {
            self.points[p - self.base].origin
        }
    }

    fn push_point(&mut self, xyz: [f64; 3], ndf: u8, origin: usize) -> usize {
        self.points.push(ShellPoint { xyz, ndf, origin });
        self.base + self.points.len() - 1
    }

    /// Vertex centroid of a planned cell.
    pub fn centroid(&self, mesh: &Mesh, cell: &ShellCell) -> [f64; 3] {
        let mut acc = [0.0; 3];
        for &v in &cell.vertices {
            let xyz = self.position(mesh, v);
            for k in 0..3 {
                acc[k] += xyz[k];
            }
        }
        acc.map(|x| x / cell.vertices.len() as f64)
    }

    /// Cells of one layer.
    pub fn layer_cells(&self, layer: usize) -> impl Iterator<Item = &ShellCell> + '_ {
        self.cells.iter().filter(move |c| c.layer == layer)
    }
}

/// Plans `num_layers` shell layers of `thickness` around `mesh`.
///
/// With `layer_ndf = Some(n)`, layer points carry `n` DOFs and every
/// exterior vertex whose `ndf` differs is duplicated at the interface (see
/// [`ShellExtrusion::interface_pairs`]). With `None` the layers inherit the
/// interface DOF counts and share the exterior vertices.
///
/// # Errors
/// - `Validation` for `num_layers == 0`.
/// - `Topology` when `thickness` is not a positive finite number.
/// - `NotImplemented` for exterior faces that are neither triangles nor quads.
pub fn extrude_shell(
    mesh: &Mesh,
    classification: &BoxClassification,
    num_layers: usize,
    thickness: f64,
    layer_ndf: Option<u8>,
    context: &str,
) -> Result<ShellExtrusion> {
    if num_layers == 0 {
        return Err(MeshAssemblyError::validation(context, "at least one layer is required"));
    }
    if !(thickness.is_finite() && thickness > 0.0) {
        return Err(MeshAssemblyError::topology(
            context,
            format!("degenerate layer thickness {thickness}"),
        ));
    }

    let mut out = ShellExtrusion {
        base: mesh.num_points(),
        thickness,
        num_layers,
        ..Default::default()
    };
    let mut signature: HashMap<usize, Signature> =
        classification.signatures.iter().map(|(&p, &s)| (p, s)).collect();

    // Interface vertices: share, or duplicate with the layer DOF count.
    let mut interface: BTreeMap<usize, usize> = BTreeMap::new();
    for (&v, &sig) in &classification.signatures {
        let mapped = match layer_ndf {
            Some(ndf) if ndf != mesh.ndf(v) => {
                let p = out.push_point(mesh.point(v), ndf, v);
                signature.insert(p, sig);
                out.interface_pairs.push((v, p));
                p
            }
            _ => v,
        };
        interface.insert(v, mapped);
    }

    let mut front: Vec<(Vec<usize>, usize, BoxSide)> = Vec::with_capacity(classification.face_count());
    for (face, side) in &classification.faces {
        let inner = face
            .vertices
            .iter()
            .map(|v| interface.get(v).copied().unwrap_or(*v))
            .collect_vec();
        front.push((inner, face.cell, *side));
    }

    for layer in 0..num_layers {
        let mut offset: BTreeMap<usize, usize> = BTreeMap::new();
        let mut next_front = Vec::with_capacity(front.len());
        for (inner, interior_cell, side) in &front {
            let cell_type = CellType::extruded_from_face(inner.len()).ok_or_else(|| {
                MeshAssemblyError::not_implemented(format!(
                    "extruding a {}-vertex exterior face",
                    inner.len()
                ))
            })?;
            let mut outer = Vec::with_capacity(inner.len());
            for &v in inner {
                let p = match offset.entry(v) {
                    Entry::Occupied(e) => *e.get(),
                    Entry::Vacant(e) => {
                        let sig = signature.get(&v).copied().unwrap_or_default();
                        let xyz = out.position(mesh, v);
                        let moved = [0, 1, 2].map(|k| xyz[k] + f64::from(sig[k]) * thickness);
                        let (ndf, origin) = (out.ndf(mesh, v), out.origin(v));
                        let p = out.push_point(moved, ndf, origin);
                        signature.insert(p, sig);
                        *e.insert(p)
                    }
                };
                outer.push(p);
            }
            // Inner faces wind outward. Hex bottoms must face into the cell,
            // wedge bases away from it.
            let vertices = match cell_type {
                CellType::Prism => inner.iter().rev().chain(outer.iter().rev()).copied().collect_vec(),
                _ => inner.iter().chain(outer.iter()).copied().collect_vec(),
            };
            out.cells.push(ShellCell {
                layer,
                cell_type,
                vertices,
                interior_cell: *interior_cell,
                side: *side,
            });
            next_front.push((outer, *interior_cell, *side));
        }
        front = next_front;
    }

    log::debug!(
        "{context}: planned {} layers, {} cells, {} points ({} interface duplicates)",
        num_layers,
        out.cells.len(),
        out.points.len(),
        out.interface_pairs.len()
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::boundary::{classify_rectangular, exterior_faces};
    use crate::algs::meshgen::{BoxOptions, StructuredCellType, structured_box};
    use crate::data::fragment::MeshFragment;
    use crate::data::mesh::CellSpec;

    fn block(n: [usize; 3], cell_type: StructuredCellType) -> Mesh {
        let opts = BoxOptions {
            cell_type,
            ..BoxOptions::default()
        };
        let data = structured_box(n, [0.0; 3], [1.0; 3], opts).unwrap();
        MeshFragment::try_new("block", data).unwrap().mesh().clone()
    }

    fn apply(mesh: &Mesh, plan: &ShellExtrusion) -> Mesh {
        let mut out = mesh.clone();
        for p in &plan.points {
            out.add_point(p.xyz, p.ndf);
        }
        let source = out.add_source("shell");
        for cell in &plan.cells {
            out.push_cell(CellSpec {
                cell_type: cell.cell_type,
                vertices: &cell.vertices,
                element_tag: 1,
                material_tag: 1,
                region: 0,
                source,
                core: None,
            })
            .unwrap();
        }
        out
    }

    #[test]
    fn each_layer_has_one_cell_per_face() {
        let mesh = block([2, 2, 2], StructuredCellType::Hexahedron);
        let cls = classify_rectangular(&mesh, 1e-9, "t").unwrap();
        let plan = extrude_shell(&mesh, &cls, 3, 0.25, None, "t").unwrap();
        assert_eq!(plan.cells.len(), 3 * 24);
        for layer in 0..3 {
            assert_eq!(plan.layer_cells(layer).count(), 24);
        }
        assert!(plan.interface_pairs.is_empty());
    }

    #[test]
    fn layered_mesh_stays_watertight_box() {
        let mesh = block([1, 1, 1], StructuredCellType::Hexahedron);
        let cls = classify_rectangular(&mesh, 1e-9, "t").unwrap();
        let plan = extrude_shell(&mesh, &cls, 2, 0.5, None, "t").unwrap();
        let grown = apply(&mesh, &plan);
        // The union is again a box with one exterior face per seed face.
        assert_eq!(exterior_faces(&grown).len(), 6);
        let (lo, hi) = grown.bounds().unwrap();
        assert_eq!(lo, [-1.0; 3]);
        assert_eq!(hi, [2.0; 3]);
        let cls2 = classify_rectangular(&grown, 1e-9, "t").unwrap();
        assert_eq!(cls2.face_count(), 6);
    }

    #[test]
    fn extruded_cells_have_positive_volume_orientation() {
        for ty in [StructuredCellType::Hexahedron, StructuredCellType::Prism] {
            let mesh = block([1, 1, 1], ty);
            let cls = classify_rectangular(&mesh, 1e-9, "t").unwrap();
            let plan = extrude_shell(&mesh, &cls, 1, 0.5, None, "t").unwrap();
            let grown = apply(&mesh, &plan);
            for cell in &plan.cells {
                let c = plan.centroid(&mesh, cell);
                let local = cell.cell_type.faces();
                for face in local {
                    let verts = face.iter().map(|&i| cell.vertices[i]).collect_vec();
                    let n = crate::algs::boundary::face_normal(&grown, &verts);
                    let fc = verts.iter().fold([0.0; 3], |mut acc, &v| {
                        let p = grown.point(v);
                        for k in 0..3 {
                            acc[k] += p[k] / verts.len() as f64;
                        }
                        acc
                    });
                    let dot: f64 = (0..3).map(|k| n[k] * (fc[k] - c[k])).sum();
                    assert!(dot > 0.0, "{:?} face {face:?} points inward", cell.cell_type);
                }
            }
        }
    }

    #[test]
    fn mismatched_ndf_duplicates_interface() {
        let mesh = block([1, 1, 1], StructuredCellType::Hexahedron);
        let cls = classify_rectangular(&mesh, 1e-9, "t").unwrap();
        let plan = extrude_shell(&mesh, &cls, 1, 0.5, Some(9), "t").unwrap();
        assert_eq!(plan.interface_pairs.len(), 8);
        // 8 duplicates + 8 offset corners.
        assert_eq!(plan.points.len(), 16);
        assert!(plan.points.iter().all(|p| p.ndf == 9));
        for &(v, p) in &plan.interface_pairs {
            assert_eq!(plan.position(&mesh, p), mesh.point(v));
        }
    }

    #[test]
    fn zero_thickness_is_a_topology_error() {
        let mesh = block([1, 1, 1], StructuredCellType::Hexahedron);
        let cls = classify_rectangular(&mesh, 1e-9, "t").unwrap();
        let err = extrude_shell(&mesh, &cls, 1, 0.0, None, "t").unwrap_err();
        assert_eq!(err.kind(), crate::mesh_error::ErrorKind::Topology);
    }
}
