//! Tolerance-based point deduplication.
//!
//! Points are bucketed on a lattice with spacing equal to the tolerance, so
//! any two points within `tol` of each other sit in adjacent buckets. Points
//! are visited in index order; each one either joins the lowest-indexed
//! surviving point within `tol` or survives itself. The result depends only
//! on point order, never on hash iteration order.

use hashbrown::HashMap;

use crate::data::mesh::Mesh;
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::topology::point::PointKey;

/// Point counts before and after a merge.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub before: usize,
    pub after: usize,
}

impl MergeStats {
    /// Number of points folded into another.
    pub fn merged(&self) -> usize {
        self.before - self.after
    }
}

#[inline]
fn dist2(a: [f64; 3], b: [f64; 3]) -> f64 {
    (0..3).map(|k| (a[k] - b[k]) * (a[k] - b[k])).sum()
}

/// Checks that `tol` is usable as a merge tolerance.
pub fn validate_tolerance(tol: f64, context: &str) -> Result<()> {
    if !(tol.is_finite() && tol > 0.0) {
        return Err(MeshAssemblyError::validation(
            context,
            format!("merge tolerance must be positive and finite, got {tol}"),
        ));
    }
    Ok(())
}

/// Computes the merge map: `map[p]` is the surviving index of point `p`,
/// `kept` lists surviving old indices in new-index order.
pub fn coincident_point_map(mesh: &Mesh, tol: f64, context: &str) -> Result<(Vec<usize>, Vec<usize>)> {
    validate_tolerance(tol, context)?;
    let tol2 = tol * tol;
    let mut grid: HashMap<PointKey, Vec<usize>> = HashMap::new();
    let mut map = Vec::with_capacity(mesh.num_points());
    let mut kept: Vec<usize> = Vec::new();

    for (p, &xyz) in mesh.points().iter().enumerate() {
        let key = PointKey::quantize(xyz, tol);
        let target = key
            .neighbourhood()
            .filter_map(|nb| grid.get(&nb))
            .flatten()
            .copied()
            .filter(|&q| dist2(mesh.point(kept[q]), xyz) <= tol2)
            .min();
        match target {
            Some(q) => {
                let survivor = kept[q];
                if mesh.ndf(survivor) != mesh.ndf(p) {
                    return Err(MeshAssemblyError::validation(
                        context,
                        format!(
                            "points {survivor} and {p} at {:?} coincide within {tol} but have ndf {} and {}",
                            xyz,
                            mesh.ndf(survivor),
                            mesh.ndf(p)
                        ),
                    ));
                }
                map.push(q);
            }
            None => {
                let q = kept.len();
                kept.push(p);
                grid.entry(key).or_default().push(q);
                map.push(q);
            }
        }
    }
    Ok((map, kept))
}

/// Returns a copy of `mesh` with points within `tol` merged.
///
/// # Errors
/// - `Validation` if two points slated for merge have different `ndf`.
/// - `Topology` if merging collapses two vertices of the same cell.
pub fn merge_points(mesh: &Mesh, tol: f64, context: &str) -> Result<(Mesh, MergeStats)> {
    let (map, kept) = coincident_point_map(mesh, tol, context)?;
    for (c, _, cell) in mesh.cells() {
        let mut merged: Vec<usize> = cell.iter().map(|&v| map[v]).collect();
        merged.sort_unstable();
        if merged.windows(2).any(|w| w[0] == w[1]) {
            return Err(MeshAssemblyError::topology(
                format!("{context}, cell {c} from `{}`", mesh.cell_source_name(c)),
                format!("merge tolerance {tol} collapses vertices of the cell"),
            ));
        }
    }
    let stats = MergeStats {
        before: mesh.num_points(),
        after: kept.len(),
    };
    let mut out = mesh.clone();
    out.remap_points(&map, &kept);
    log::debug!(
        "{context}: merged {} of {} points (tol = {tol})",
        stats.merged(),
        stats.before
    );
    Ok((out, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mesh::CellSpec;
    use crate::mesh_error::ErrorKind;
    use crate::topology::cell_type::CellType;

    fn two_triangles(gap: f64, ndf_b: u8) -> Mesh {
        let mut mesh = Mesh::new();
        let a = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let b = [[1.0 + gap, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0 + gap, 0.0]];
        for p in a {
            mesh.add_point(p, 3);
        }
        for p in b {
            mesh.add_point(p, ndf_b);
        }
        let source = mesh.add_source("pair");
        for verts in [[0, 1, 2], [3, 4, 5]] {
            mesh.push_cell(CellSpec {
                cell_type: CellType::Triangle,
                vertices: &verts,
                element_tag: 1,
                material_tag: 1,
                region: 0,
                source,
                core: None,
            })
            .unwrap();
        }
        mesh
    }

    #[test]
    fn merges_points_within_tolerance() {
        let mesh = two_triangles(1e-4, 3);
        let (merged, stats) = merge_points(&mesh, 1e-3, "test").unwrap();
        assert_eq!(stats.merged(), 2);
        assert_eq!(merged.num_points(), 4);
        assert_eq!(merged.cell(1), &[1, 3, 2]);
        assert_eq!(merged.point(1), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn keeps_points_beyond_tolerance() {
        let mesh = two_triangles(1e-2, 3);
        let (merged, stats) = merge_points(&mesh, 1e-3, "test").unwrap();
        assert_eq!(stats.merged(), 0);
        assert_eq!(merged.num_points(), 6);
    }

    #[test]
    fn ndf_mismatch_is_validation_error() {
        let mesh = two_triangles(0.0, 9);
        let err = merge_points(&mesh, 1e-3, "section 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("section 1"));
    }

    #[test]
    fn collapsing_a_cell_is_topology_error() {
        let mut mesh = Mesh::new();
        for p in [[0.0, 0.0, 0.0], [1e-6, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            mesh.add_point(p, 3);
        }
        let source = mesh.add_source("sliver");
        mesh.push_cell(CellSpec {
            cell_type: CellType::Triangle,
            vertices: &[0, 1, 2],
            element_tag: 1,
            material_tag: 1,
            region: 0,
            source,
            core: None,
        })
        .unwrap();
        let err = merge_points(&mesh, 1e-3, "test").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Topology);
    }

    #[test]
    fn non_positive_tolerance_is_rejected() {
        let mesh = two_triangles(0.0, 3);
        assert!(merge_points(&mesh, 0.0, "test").is_err());
        assert!(merge_points(&mesh, f64::NAN, "test").is_err());
    }
}
