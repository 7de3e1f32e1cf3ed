//! Assembly sections: named groups of fragments merged and partitioned together.

use crate::algs::merge::{MergeStats, merge_points};
use crate::data::fragment::FragmentStore;
use crate::data::mesh::Mesh;
use crate::mesh_error::{MeshAssemblyError, Result};
use crate::partitioning::{PartitionAlgorithm, partition_cells, partition_count};

/// A group of fragments that become one local mesh.
///
/// Sections are created explicitly, rebuilt in place by [`build`] and
/// [`partition`], and never dropped implicitly. A failed build or partition
/// leaves the previous local mesh untouched.
///
/// [`build`]: AssemblySection::build
/// [`partition`]: AssemblySection::partition
#[derive(Clone, Debug)]
pub struct AssemblySection {
    tag: usize,
    fragments: Vec<String>,
    num_partitions: usize,
    algorithm: PartitionAlgorithm,
    merge_points: bool,
    mesh: Option<Mesh>,
}

impl AssemblySection {
    /// Creates an unbuilt section.
    ///
    /// # Errors
    /// `Validation` for an empty fragment list or a fragment named twice.
    pub fn new(
        tag: usize,
        fragments: Vec<String>,
        num_partitions: usize,
        algorithm: PartitionAlgorithm,
        merge_points: bool,
    ) -> Result<Self> {
        let context = format!("section {tag}");
        if fragments.is_empty() {
            return Err(MeshAssemblyError::validation(context, "a section needs at least one fragment"));
        }
        for (i, name) in fragments.iter().enumerate() {
            if fragments[..i].contains(name) {
                return Err(MeshAssemblyError::validation(
                    context,
                    format!("fragment `{name}` listed twice"),
                ));
            }
        }
        Ok(Self {
            tag,
            fragments,
            num_partitions,
            algorithm,
            merge_points,
            mesh: None,
        })
    }

    /// 1-based position in the assembler.
    pub fn tag(&self) -> usize {
        self.tag
    }

    pub(crate) fn set_tag(&mut self, tag: usize) {
        self.tag = tag;
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    pub fn algorithm(&self) -> PartitionAlgorithm {
        self.algorithm
    }

    pub fn merge_points(&self) -> bool {
        self.merge_points
    }

    /// Number of distinct `Core` ids this section contributes.
    pub fn partition_count(&self) -> usize {
        partition_count(self.num_partitions, self.algorithm)
    }

    /// The local mesh, once built.
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn is_built(&self) -> bool {
        self.mesh.is_some()
    }

    fn context(&self) -> String {
        format!("section {}", self.tag)
    }

    /// Concatenates the fragments and optionally merges coincident points.
    fn merged_mesh(&self, store: &FragmentStore, merge: bool, tol: f64) -> Result<(Mesh, MergeStats)> {
        let context = self.context();
        let mut mesh = Mesh::new();
        for name in &self.fragments {
            let fragment = store.require(name, &context)?;
            mesh.append(fragment.mesh(), None)?;
        }
        if merge {
            merge_points(&mesh, tol, &context)
        } else {
            let n = mesh.num_points();
            Ok((mesh, MergeStats { before: n, after: n }))
        }
    }

    /// Rebuilds the local mesh from `store`, dropping any `Core` array.
    pub fn build(&mut self, store: &FragmentStore, merge: bool, tol: f64) -> Result<MergeStats> {
        let (mesh, stats) = self.merged_mesh(store, merge, tol)?;
        self.merge_points = merge;
        self.mesh = Some(mesh);
        Ok(stats)
    }

    /// Writes a `Core` array onto the local mesh.
    ///
    /// With `num_partitions <= 1` the `Core` array is removed instead.
    ///
    /// # Errors
    /// `Validation` if the section is not built; `Partition` if there are
    /// fewer cells than partitions.
    pub fn partition(&mut self, num_partitions: usize, algorithm: PartitionAlgorithm) -> Result<()> {
        let context = self.context();
        let mesh = self
            .mesh
            .as_ref()
            .ok_or_else(|| MeshAssemblyError::validation(&context, "section must be built before partitioning"))?;
        let core = partition_cells(mesh, num_partitions, algorithm, &context)?;
        let mut staged = mesh.clone();
        match core {
            Some(core) => staged.set_core(core)?,
            None => staged.clear_core(),
        }
        self.num_partitions = num_partitions;
        self.algorithm = algorithm;
        self.mesh = Some(staged);
        Ok(())
    }

    /// Builds and partitions with the section's own settings without
    /// touching `self`.
    pub(crate) fn stage(&self, store: &FragmentStore, tol: f64) -> Result<Mesh> {
        let (mut mesh, stats) = self.merged_mesh(store, self.merge_points, tol)?;
        if let Some(core) = partition_cells(&mesh, self.num_partitions, self.algorithm, &self.context())? {
            mesh.set_core(core)?;
        }
        log::info!(
            "section {}: {} cells, {} points ({} merged), {} partition(s)",
            self.tag,
            mesh.num_cells(),
            mesh.num_points(),
            stats.merged(),
            self.partition_count()
        );
        Ok(mesh)
    }

    pub(crate) fn commit(&mut self, mesh: Mesh) {
        self.mesh = Some(mesh);
    }
}
