//! Entry-point for spatial partitioning of mesh cells into `Core` ids.

pub mod error;
pub mod kd_tree;
pub mod metrics;

pub use self::error::PartitionError;
pub use self::metrics::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::mesh::Mesh;
use crate::mesh_error::{MeshAssemblyError, Result};

/// Supported partitioning algorithms.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PartitionAlgorithm {
    /// Recursive coordinate bisection; partition counts round up to a power of two.
    #[default]
    KdTree,
}

impl PartitionAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            PartitionAlgorithm::KdTree => "kd-tree",
        }
    }
}

impl fmt::Display for PartitionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionAlgorithm {
    type Err = MeshAssemblyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kd-tree" | "kdtree" | "kd_tree" => Ok(PartitionAlgorithm::KdTree),
            _ => Err(MeshAssemblyError::validation(
                "partition algorithm",
                format!("unknown algorithm `{s}` (supported: kd-tree)"),
            )),
        }
    }
}

impl TryFrom<String> for PartitionAlgorithm {
    type Error = MeshAssemblyError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<PartitionAlgorithm> for String {
    fn from(a: PartitionAlgorithm) -> Self {
        a.as_str().to_string()
    }
}

/// Smallest power of two `>= n` (with `next_pow2(0) == 1`).
#[inline]
pub fn next_pow2(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Number of partitions actually produced for a request of `num_partitions`.
///
/// Requests of zero or one mean a single implicit partition.
#[inline]
pub fn partition_count(num_partitions: usize, algorithm: PartitionAlgorithm) -> usize {
    if num_partitions <= 1 {
        return 1;
    }
    match algorithm {
        PartitionAlgorithm::KdTree => next_pow2(num_partitions),
    }
}

/// Partitions points (usually cell centroids) into
/// `partition_count(num_partitions, algorithm)` contiguous ids.
///
/// # Errors
/// [`PartitionError::EmptyInput`] with no points, [`PartitionError::Infeasible`]
/// when there are fewer points than partitions.
pub fn partition_centroids(
    centroids: &[[f64; 3]],
    num_partitions: usize,
    algorithm: PartitionAlgorithm,
    context: &str,
) -> std::result::Result<Vec<usize>, PartitionError> {
    if centroids.is_empty() {
        return Err(PartitionError::EmptyInput(context.to_string()));
    }
    let parts = partition_count(num_partitions, algorithm);
    if centroids.len() < parts {
        return Err(PartitionError::Infeasible {
            context: context.to_string(),
            cells: centroids.len(),
            parts,
        });
    }
    let core = match algorithm {
        PartitionAlgorithm::KdTree => kd_tree::kd_tree_partition(centroids, parts),
    };
    log::debug!("{context}: {} cells split into {parts} partitions with {algorithm}", centroids.len());
    Ok(core)
}

/// Partitions the cells of `mesh`, or returns `None` for a single partition.
pub fn partition_cells(
    mesh: &Mesh,
    num_partitions: usize,
    algorithm: PartitionAlgorithm,
    context: &str,
) -> Result<Option<Vec<usize>>> {
    if num_partitions <= 1 {
        return Ok(None);
    }
    let centroids: Vec<[f64; 3]> = (0..mesh.num_cells()).map(|c| mesh.centroid(c)).collect();
    Ok(Some(partition_centroids(&centroids, num_partitions, algorithm, context)?))
}
