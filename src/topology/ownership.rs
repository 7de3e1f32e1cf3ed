//! Core ownership metadata for mesh points.
//!
//! A [`CoreMap`] records, for every point of a partitioned mesh, the sorted
//! set of `Core` ids whose cells touch it. The lowest such core owns the
//! point; every other core holds a ghost copy.

use serde::{Deserialize, Serialize};

use crate::data::mesh::Mesh;
use crate::mesh_error::{MeshAssemblyError, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreMap {
    cores: Vec<Vec<usize>>,
    num_cores: usize,
}

impl CoreMap {
    /// Builds the map from a mesh carrying a `Core` array.
    pub fn from_mesh(mesh: &Mesh) -> Result<Self> {
        let core = mesh.core().ok_or_else(|| {
            MeshAssemblyError::validation("core map", "mesh has no Core array")
        })?;
        let mut cores: Vec<Vec<usize>> = vec![Vec::new(); mesh.num_points()];
        for (c, _, cell) in mesh.cells() {
            for &v in cell {
                if let Err(pos) = cores[v].binary_search(&core[c]) {
                    cores[v].insert(pos, core[c]);
                }
            }
        }
        let num_cores = core.iter().copied().max().map_or(0, |m| m + 1);
        Ok(Self { cores, num_cores })
    }

    /// Number of points tracked.
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    /// One past the largest `Core` id in the mesh.
    pub fn num_cores(&self) -> usize {
        self.num_cores
    }

    /// Sorted cores touching `point`; empty for orphan points.
    pub fn cores(&self, point: usize) -> &[usize] {
        self.cores.get(point).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Owning core of `point`.
    pub fn owner(&self, point: usize) -> Option<usize> {
        self.cores(point).first().copied()
    }

    /// Returns true if more than one core touches `point`.
    pub fn is_shared(&self, point: usize) -> bool {
        self.cores(point).len() > 1
    }

    /// Iterate over points touched by more than one core.
    pub fn shared_points(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.cores.len()).filter(move |&p| self.is_shared(p))
    }
}
