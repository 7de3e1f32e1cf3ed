//! MeshAssemblyError: Unified error type for mesh-assembly public APIs
//!
//! Every fallible operation (`create_section`, `Assemble`, `add_absorbing_layer`,
//! interface registration) reports one of four error kinds. Errors carry the
//! failing fragment/section/layer as `context` together with the violated condition.

use crate::partitioning::error::PartitionError;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, MeshAssemblyError>;

/// Coarse error category, independent of the payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Validation,
    Topology,
    Partition,
    NotImplemented,
}

/// Unified error type for mesh-assembly operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshAssemblyError {
    /// Bad parameters: unknown names, out-of-range values, DOF mismatch on merge.
    #[error("validation error in {context}: {reason}")]
    Validation { context: String, reason: String },
    /// Broken connectivity: dangling cell references, degenerate extrusion.
    #[error("topology error in {context}: {reason}")]
    Topology { context: String, reason: String },
    /// The requested partitioning cannot be produced.
    #[error(transparent)]
    Partition(#[from] PartitionError),
    /// A recognised request for a feature this crate does not provide.
    #[error("not implemented: {feature}")]
    NotImplemented { feature: String },
}

impl MeshAssemblyError {
    pub fn validation(context: impl Into<String>, reason: impl Into<String>) -> Self {
        MeshAssemblyError::Validation {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn topology(context: impl Into<String>, reason: impl Into<String>) -> Self {
        MeshAssemblyError::Topology {
            context: context.into(),
            reason: reason.into(),
        }
    }

    pub fn not_implemented(feature: impl Into<String>) -> Self {
        MeshAssemblyError::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshAssemblyError::Validation { .. } => ErrorKind::Validation,
            MeshAssemblyError::Topology { .. } => ErrorKind::Topology,
            MeshAssemblyError::Partition(_) => ErrorKind::Partition,
            MeshAssemblyError::NotImplemented { .. } => ErrorKind::NotImplemented,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context_and_reason() {
        let err = MeshAssemblyError::validation("section 2", "fragment `soil` is unknown");
        assert_eq!(
            err.to_string(),
            "validation error in section 2: fragment `soil` is unknown"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn partition_errors_convert() {
        let err: MeshAssemblyError = PartitionError::Infeasible {
            context: "section 1".into(),
            cells: 3,
            parts: 4,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Partition);
        assert!(err.to_string().contains("section 1"));
    }
}
