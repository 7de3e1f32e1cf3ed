//! Exterior surface extraction and box classification.
//!
//! A face is exterior when exactly one volume cell uses it. For a mesh that
//! fills an axis-aligned box, every exterior face lies on one of the six box
//! sides, and every exterior vertex carries a *signature* `[sx, sy, sz]`
//! with `s = -1/+1` on the min/max plane of that axis and `0` otherwise:
//! one non-zero entry marks a face vertex, two an edge vertex (12 edges),
//! three a corner (8 corners).

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::data::mesh::Mesh;
use crate::mesh_error::{MeshAssemblyError, Result};

/// An exterior face with outward-oriented vertex order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExteriorFace {
    /// The volume cell owning the face.
    pub cell: usize,
    pub vertices: Vec<usize>,
}

/// One side of an axis-aligned box.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoxSide {
    pub axis: usize,
    pub positive: bool,
}

impl BoxSide {
    /// All six sides: -x, +x, -y, +y, -z, +z.
    pub const ALL: [BoxSide; 6] = [
        BoxSide { axis: 0, positive: false },
        BoxSide { axis: 0, positive: true },
        BoxSide { axis: 1, positive: false },
        BoxSide { axis: 1, positive: true },
        BoxSide { axis: 2, positive: false },
        BoxSide { axis: 2, positive: true },
    ];

    /// Outward unit normal.
    pub fn normal(self) -> [f64; 3] {
        let mut n = [0.0; 3];
        n[self.axis] = if self.positive { 1.0 } else { -1.0 };
        n
    }
}

/// Vertex position class on the box boundary.
pub type Signature = [i8; 3];

/// Number of non-zero entries: 1 face, 2 edge, 3 corner.
#[inline]
pub fn signature_rank(sig: Signature) -> usize {
    sig.iter().filter(|&&s| s != 0).count()
}

/// Exterior faces of `mesh`, ordered by owning cell then local face index.
///
/// Surface (2D) cells contribute no faces.
pub fn exterior_faces(mesh: &Mesh) -> Vec<ExteriorFace> {
    // sorted vertex key -> (use count, first (cell, local face))
    let mut seen: HashMap<Vec<usize>, (usize, usize, usize)> = HashMap::new();
    for (c, cell_type, cell) in mesh.cells() {
        for (f, local) in cell_type.faces().iter().enumerate() {
            let mut key: Vec<usize> = local.iter().map(|&i| cell[i]).collect();
            key.sort_unstable();
            seen.entry(key)
                .and_modify(|e| e.0 += 1)
                .or_insert((1, c, f));
        }
    }
    let mut owners: Vec<(usize, usize)> = seen
        .into_values()
        .filter(|&(count, _, _)| count == 1)
        .map(|(_, c, f)| (c, f))
        .collect();
    owners.sort_unstable();
    owners
        .into_iter()
        .map(|(c, f)| {
            let cell = mesh.cell(c);
            ExteriorFace {
                cell: c,
                vertices: mesh.cell_type(c).faces()[f].iter().map(|&i| cell[i]).collect(),
            }
        })
        .collect()
}

/// Newell normal of a polygon (length is twice its area).
pub fn face_normal(mesh: &Mesh, vertices: &[usize]) -> [f64; 3] {
    let mut n = [0.0; 3];
    for (i, &a) in vertices.iter().enumerate() {
        let a = mesh.point(a);
        let b = mesh.point(vertices[(i + 1) % vertices.len()]);
        n[0] += (a[1] - b[1]) * (a[2] + b[2]);
        n[1] += (a[2] - b[2]) * (a[0] + b[0]);
        n[2] += (a[0] - b[0]) * (a[1] + b[1]);
    }
    n
}

/// Exterior of a box-shaped mesh, grouped by side.
#[derive(Clone, Debug, Default)]
pub struct BoxClassification {
    pub lower: [f64; 3],
    pub upper: [f64; 3],
    /// Non-degenerate exterior faces with their side.
    pub faces: Vec<(ExteriorFace, BoxSide)>,
    /// Signature of every vertex on a classified face.
    pub signatures: BTreeMap<usize, Signature>,
    /// Faces skipped because their area vanishes.
    pub warnings: Vec<String>,
}

impl BoxClassification {
    /// Number of classified exterior faces.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Faces on one side.
    pub fn side_faces(&self, side: BoxSide) -> impl Iterator<Item = &ExteriorFace> + '_ {
        self.faces
            .iter()
            .filter(move |(_, s)| *s == side)
            .map(|(f, _)| f)
    }

    /// Vertices grouped by signature, restricted to one rank.
    fn group(&self, rank: usize) -> BTreeMap<Signature, Vec<usize>> {
        let mut out: BTreeMap<Signature, Vec<usize>> = BTreeMap::new();
        for (&p, &sig) in &self.signatures {
            if signature_rank(sig) == rank {
                out.entry(sig).or_default().push(p);
            }
        }
        out
    }

    /// Vertices in the interior of each box side.
    pub fn face_points(&self) -> BTreeMap<Signature, Vec<usize>> {
        self.group(1)
    }

    /// Vertices on each of the (up to 12) box edges, corners excluded.
    pub fn edge_points(&self) -> BTreeMap<Signature, Vec<usize>> {
        self.group(2)
    }

    /// The (up to 8) corner vertices.
    pub fn corner_points(&self) -> BTreeMap<Signature, Vec<usize>> {
        self.group(3)
    }

    /// Centre and half-extents of the box.
    pub fn center_and_half_extent(&self) -> ([f64; 3], [f64; 3]) {
        let mut center = [0.0; 3];
        let mut half = [0.0; 3];
        for k in 0..3 {
            center[k] = 0.5 * (self.lower[k] + self.upper[k]);
            half[k] = 0.5 * (self.upper[k] - self.lower[k]);
        }
        (center, half)
    }

    /// Mean length of the exterior face edges.
    pub fn mean_edge_length(&self, mesh: &Mesh) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for (face, _) in &self.faces {
            for (i, &a) in face.vertices.iter().enumerate() {
                let b = face.vertices[(i + 1) % face.vertices.len()];
                let (pa, pb) = (mesh.point(a), mesh.point(b));
                total += (0..3).map(|k| (pa[k] - pb[k]).powi(2)).sum::<f64>().sqrt();
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { total / count as f64 }
    }
}

/// Classifies the exterior of `mesh` against its bounding box.
///
/// Faces whose area vanishes are skipped and reported in `warnings`. Faces
/// listed with an inward normal are flipped.
///
/// # Errors
/// - `Topology` if the mesh has no volume cells or a flat bounding box.
/// - `Validation` if an exterior face does not lie on a box side, i.e. the
///   mesh is not box shaped.
pub fn classify_rectangular(mesh: &Mesh, tol: f64, context: &str) -> Result<BoxClassification> {
    let (lower, upper) = mesh
        .bounds()
        .ok_or_else(|| MeshAssemblyError::topology(context, "mesh has no points"))?;
    if let Some(k) = (0..3).find(|&k| upper[k] - lower[k] <= tol) {
        return Err(MeshAssemblyError::topology(
            context,
            format!("bounding box has no extent along axis {k}"),
        ));
    }
    let faces = exterior_faces(mesh);
    if faces.is_empty() {
        return Err(MeshAssemblyError::topology(context, "mesh has no exterior volume faces"));
    }

    let sig_of = |p: usize| -> Signature {
        let xyz = mesh.point(p);
        let mut sig = [0i8; 3];
        for k in 0..3 {
            if (xyz[k] - lower[k]).abs() <= tol {
                sig[k] = -1;
            } else if (xyz[k] - upper[k]).abs() <= tol {
                sig[k] = 1;
            }
        }
        sig
    };

    let mut out = BoxClassification {
        lower,
        upper,
        ..Default::default()
    };
    for mut face in faces {
        let normal = face_normal(mesh, &face.vertices);
        let area2 = normal.iter().map(|x| x * x).sum::<f64>().sqrt();
        if area2 <= tol * tol {
            let msg = format!(
                "{context}: exterior face of cell {} has zero area and was skipped",
                face.cell
            );
            log::warn!("{msg}");
            out.warnings.push(msg);
            continue;
        }
        let sigs: Vec<Signature> = face.vertices.iter().map(|&v| sig_of(v)).collect();
        let side = (0..3).find_map(|k| {
            let s = sigs[0][k];
            (s != 0 && sigs.iter().all(|sig| sig[k] == s)).then_some(BoxSide {
                axis: k,
                positive: s > 0,
            })
        });
        let Some(side) = side else {
            return Err(MeshAssemblyError::validation(
                format!("{context}, cell {} from `{}`", face.cell, mesh.cell_source_name(face.cell)),
                "exterior face does not lie on the bounding box; mesh is not Rectangular",
            ));
        };
        if normal[side.axis] * side.normal()[side.axis] < 0.0 {
            log::debug!("{context}: flipping inward face of cell {}", face.cell);
            face.vertices.reverse();
        }
        for (&v, sig) in face.vertices.iter().zip(sigs) {
            out.signatures.insert(v, sig);
        }
        out.faces.push((face, side));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::meshgen::structured_box;
    use crate::data::fragment::MeshFragment;

    fn block(n: [usize; 3]) -> Mesh {
        let data = structured_box(n, [0.0; 3], [n[0] as f64, n[1] as f64, n[2] as f64], Default::default())
            .unwrap();
        MeshFragment::try_new("block", data).unwrap().mesh().clone()
    }

    #[test]
    fn single_hex_has_six_exterior_faces() {
        let mesh = block([1, 1, 1]);
        let faces = exterior_faces(&mesh);
        assert_eq!(faces.len(), 6);
        assert!(faces.iter().all(|f| f.cell == 0 && f.vertices.len() == 4));
    }

    #[test]
    fn interior_faces_are_not_exterior() {
        let mesh = block([2, 2, 2]);
        assert_eq!(exterior_faces(&mesh).len(), 24);
    }

    #[test]
    fn box_groups_faces_edges_and_corners() {
        let mesh = block([2, 2, 2]);
        let cls = classify_rectangular(&mesh, 1e-6, "test").unwrap();
        assert_eq!(cls.face_count(), 24);
        for side in BoxSide::ALL {
            assert_eq!(cls.side_faces(side).count(), 4);
        }
        assert_eq!(cls.corner_points().len(), 8);
        let edges = cls.edge_points();
        assert_eq!(edges.len(), 12);
        assert!(edges.values().all(|pts| pts.len() == 1));
        assert_eq!(cls.face_points().len(), 6);
        assert!((cls.mean_edge_length(&mesh) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn faces_point_outward() {
        let mesh = block([1, 1, 1]);
        let cls = classify_rectangular(&mesh, 1e-6, "test").unwrap();
        for (face, side) in &cls.faces {
            let n = face_normal(&mesh, &face.vertices);
            assert!(n[side.axis] * side.normal()[side.axis] > 0.0);
        }
    }

    #[test]
    fn zero_area_faces_are_skipped_with_warnings() {
        let mut data = structured_box([1, 1, 1], [0.0; 3], [1.0; 3], Default::default()).unwrap();
        // A second hex collapsed onto the x = 1 plane, not merged with the first.
        let base = data.points.len();
        let flat: Vec<[f64; 3]> = data.points.iter().map(|p| [1.0, p[1], p[2]]).collect();
        data.points.extend(flat);
        data.ndf.extend([3; 8]);
        data.cells.push(data.cells[0].iter().map(|v| v + base).collect());
        data.cell_types.push(data.cell_types[0]);
        data.element_tag.push(1);
        data.material_tag.push(1);
        data.region.push(0);
        let mesh = MeshFragment::try_new("flat", data).unwrap().mesh().clone();

        let cls = classify_rectangular(&mesh, 1e-6, "test").unwrap();
        assert_eq!(cls.warnings.len(), 4);
        assert!(cls.warnings.iter().all(|w| w.contains("cell 1 has zero area")));
        assert_eq!(cls.face_count(), 8);
        let plus_x = BoxSide { axis: 0, positive: true };
        assert_eq!(cls.side_faces(plus_x).count(), 3);
    }

    #[test]
    fn l_shaped_mesh_is_not_rectangular() {
        let mut data = structured_box([2, 2, 1], [0.0; 3], [2.0, 2.0, 1.0], Default::default()).unwrap();
        // Drop the (1, 1) column to carve an L.
        data.cells.pop();
        data.cell_types.pop();
        data.element_tag.pop();
        data.material_tag.pop();
        data.region.pop();
        let mesh = MeshFragment::try_new("ell", data).unwrap().mesh().clone();
        let err = classify_rectangular(&mesh, 1e-6, "test").unwrap_err();
        assert_eq!(err.kind(), crate::mesh_error::ErrorKind::Validation);
    }
}
