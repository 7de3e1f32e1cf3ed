//! Partitioning errors for mesh-assembly

use thiserror::Error;

/// Errors from spatial partitioning routines
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartitionError {
    /// Fewer cells than leaves: some partition would be empty
    #[error("cannot split {cells} cells of {context} into {parts} partitions")]
    Infeasible {
        context: String,
        cells: usize,
        parts: usize,
    },
    /// Nothing to partition
    #[error("{0} has no cells to partition")]
    EmptyInput(String),
}
