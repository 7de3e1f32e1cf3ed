//! Mesh fragments: independently generated mesh pieces prior to assembly.
//!
//! A [`FragmentData`] is the raw input contract (points, cells and the
//! parallel tag arrays). [`MeshFragment::try_new`] validates it once and
//! freezes it; fragments are immutable afterwards and are looked up by
//! name through the [`FragmentStore`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::mesh::{CellSpec, Mesh};
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::topology::cell_type::CellType;

/// Raw fragment arrays as produced by an external mesher.
///
/// `cell_types`, `element_tag`, `material_tag` and `region` have one entry
/// per cell; `ndf` has one entry per point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentData {
    pub points: Vec<[f64; 3]>,
    pub cells: Vec<Vec<usize>>,
    pub cell_types: Vec<CellType>,
    pub element_tag: Vec<u32>,
    pub material_tag: Vec<u32>,
    pub region: Vec<u32>,
    pub ndf: Vec<u8>,
}

/// A validated, immutable mesh piece.
#[derive(Clone, Debug)]
pub struct MeshFragment {
    name: String,
    mesh: Mesh,
}

impl MeshFragment {
    /// Validates `data` and freezes it under `name`.
    ///
    /// # Errors
    /// - `Validation` when a tag array length differs from the cell count, the
    ///   `ndf` length differs from the point count, an `ndf` is zero, or a
    ///   coordinate is not finite.
    /// - `Topology` when a cell references a missing point or has the wrong
    ///   number of vertices for its type.
    pub fn try_new(name: impl Into<String>, data: FragmentData) -> Result<Self> {
        let name = name.into();
        let context = format!("fragment `{name}`");
        if name.is_empty() {
            return Err(MeshAssemblyError::validation(context, "name must not be empty"));
        }
        let n_cells = data.cells.len();
        for (array, len) in [
            ("cell_types", data.cell_types.len()),
            ("ElementTag", data.element_tag.len()),
            ("MaterialTag", data.material_tag.len()),
            ("Region", data.region.len()),
        ] {
            if len != n_cells {
                return Err(MeshAssemblyError::validation(
                    context,
                    format!("{array} has {len} entries for {n_cells} cells"),
                ));
            }
        }
        if data.ndf.len() != data.points.len() {
            return Err(MeshAssemblyError::validation(
                context,
                format!("ndf has {} entries for {} points", data.ndf.len(), data.points.len()),
            ));
        }
        if let Some(p) = data.ndf.iter().position(|&n| n == 0) {
            return Err(MeshAssemblyError::validation(context, format!("point {p} has ndf 0")));
        }
        if let Some(p) = data.points.iter().position(|xyz| !xyz.iter().all(|x| x.is_finite())) {
            return Err(MeshAssemblyError::validation(
                context,
                format!("point {p} has non-finite coordinates {:?}", data.points[p]),
            ));
        }

        let mut mesh = Mesh::new();
        for (xyz, ndf) in data.points.iter().zip(&data.ndf) {
            mesh.add_point(*xyz, *ndf);
        }
        let source = mesh.add_source(&name);
        for (c, vertices) in data.cells.iter().enumerate() {
            mesh.push_cell(CellSpec {
                cell_type: data.cell_types[c],
                vertices,
                element_tag: data.element_tag[c],
                material_tag: data.material_tag[c],
                region: data.region[c],
                source,
                core: None,
            })
            .map_err(|err| match err {
                MeshAssemblyError::Topology { context: cell, reason } => {
                    MeshAssemblyError::topology(format!("{context}, {cell}"), reason)
                }
                other => other,
            })?;
        }
        mesh.debug_assert_invariants();
        Ok(Self { name, mesh })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The fragment as a single-source, unpartitioned mesh.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn num_points(&self) -> usize {
        self.mesh.num_points()
    }

    pub fn num_cells(&self) -> usize {
        self.mesh.num_cells()
    }
}

/// Named registry of fragments, iterated in name order.
#[derive(Clone, Debug, Default)]
pub struct FragmentStore {
    fragments: BTreeMap<String, MeshFragment>,
}

impl FragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a fragment; names are unique.
    pub fn insert(&mut self, fragment: MeshFragment) -> Result<()> {
        if self.fragments.contains_key(fragment.name()) {
            return Err(MeshAssemblyError::validation(
                format!("fragment `{}`", fragment.name()),
                "a fragment with this name already exists",
            ));
        }
        self.fragments.insert(fragment.name.clone(), fragment);
        Ok(())
    }

    /// Validates `data` and stores it under `name`.
    pub fn add(&mut self, name: impl Into<String>, data: FragmentData) -> Result<()> {
        self.insert(MeshFragment::try_new(name, data)?)
    }

    pub fn get(&self, name: &str) -> Option<&MeshFragment> {
        self.fragments.get(name)
    }

    /// Looks up a fragment, reporting `context` when it is missing.
    pub fn require(&self, name: &str, context: &str) -> Result<&MeshFragment> {
        self.get(name).ok_or_else(|| {
            MeshAssemblyError::validation(context, format!("fragment `{name}` does not exist"))
        })
    }

    pub fn remove(&mut self, name: &str) -> Option<MeshFragment> {
        self.fragments.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fragments.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_error::ErrorKind;

    fn single_tet() -> FragmentData {
        FragmentData {
            points: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            cells: vec![vec![0, 1, 2, 3]],
            cell_types: vec![CellType::Tetrahedron],
            element_tag: vec![1],
            material_tag: vec![1],
            region: vec![0],
            ndf: vec![3; 4],
        }
    }

    #[test]
    fn valid_fragment_round_trips_counts() {
        let frag = MeshFragment::try_new("tet", single_tet()).unwrap();
        assert_eq!(frag.num_points(), 4);
        assert_eq!(frag.num_cells(), 1);
        assert_eq!(frag.mesh().cell_source_name(0), "tet");
        assert!(frag.mesh().core().is_none());
    }

    #[test]
    fn tag_length_mismatch_is_validation_error() {
        let mut data = single_tet();
        data.region.push(4);
        let err = MeshFragment::try_new("tet", data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("Region"));
    }

    #[test]
    fn ndf_length_mismatch_is_validation_error() {
        let mut data = single_tet();
        data.ndf.pop();
        let err = MeshFragment::try_new("tet", data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut data = single_tet();
            data.points[2][1] = bad;
            let err = MeshFragment::try_new("tet", data).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert!(err.to_string().contains("point 2"), "{err}");
        }
    }

    #[test]
    fn dangling_reference_names_fragment_and_cell() {
        let mut data = single_tet();
        data.cells[0][3] = 9;
        let err = MeshFragment::try_new("tet", data).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Topology);
        let msg = err.to_string();
        assert!(msg.contains("fragment `tet`") && msg.contains("cell 0"), "{msg}");
    }

    #[test]
    fn store_rejects_duplicate_names() {
        let mut store = FragmentStore::new();
        store.add("tet", single_tet()).unwrap();
        assert!(store.add("tet", single_tet()).is_err());
        assert!(store.require("soil", "section 1").is_err());
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["tet"]);
    }
}
