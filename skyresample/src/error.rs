//! Error types for reprojection.
//!
//! Every fail-fast error carries the values needed to diagnose it (the
//! offending shape, dimension count or worker count). Zero-weight output
//! pixels are not errors; they surface as NaN in the resampled image.

use thiserror::Error;

use crate::kernel::KernelError;

/// Result type for reprojection operations.
pub type ReprojectResult<T> = Result<T, ReprojectError>;

/// Coarse classification of a [`ReprojectError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid parallelism or other caller configuration.
    Configuration,
    /// Unsupported spatial rank or mismatched shapes.
    Dimensionality,
    /// The overlap kernel failed for one of the partitions.
    Kernel,
    /// The call was cancelled before completion.
    Cancelled,
}

/// Errors that can occur during an exact reprojection call.
#[derive(Debug, Error)]
pub enum ReprojectError {
    /// Worker count was zero or negative.
    #[error("The number of workers must be strictly positive, got {0}")]
    InvalidWorkerCount(i64),

    /// A parallelism setting could not be interpreted.
    #[error("Invalid parallelism setting '{0}': expected a boolean, 'auto' or a positive integer")]
    InvalidParallelism(String),

    /// The worker thread pool could not be created.
    #[error("Failed to create worker pool with {workers} threads: {reason}")]
    PoolCreation { workers: usize, reason: String },

    /// Only 2-D spatial projections are supported.
    #[error("Only 2-dimensional projections can be reprojected, input grid has {0} pixel axes")]
    UnsupportedSpatialRank(usize),

    /// Output shape has fewer axes than the output grid.
    #[error("Too few dimensions in output shape {shape:?}: the output grid needs at least {required}")]
    OutputShapeTooShort { shape: Vec<usize>, required: usize },

    /// Input image has fewer axes than the input grid.
    #[error("Too few dimensions in input image {shape:?}: the input grid needs at least {required}")]
    InputShapeTooShort { shape: Vec<usize>, required: usize },

    /// Input and output ranks differ.
    #[error("Number of dimensions in input {input:?} and output {output:?} should match")]
    RankMismatch { input: Vec<usize>, output: Vec<usize> },

    /// Leading loop dimensions differ between input and output.
    #[error("Dimensions to be looped over must match exactly: input {input:?}, output {output:?}")]
    LoopDimensionMismatch { input: Vec<usize>, output: Vec<usize> },

    /// Spatial dimensions of the image disagree with the grid's declared shape.
    #[error("Input spatial shape {actual:?} does not match the input grid shape {declared:?}")]
    SpatialShapeMismatch {
        declared: (usize, usize),
        actual: (usize, usize),
    },

    /// An axis of the image or output shape has zero length.
    #[error("Axis {axis} of shape {shape:?} has zero length")]
    EmptyAxis { shape: Vec<usize>, axis: usize },

    /// The number of assembled slices differs from the loop count.
    #[error("Expected {expected} resampled slices, got {actual}")]
    IncompleteResult { expected: usize, actual: usize },

    /// The overlap kernel failed.
    #[error("Overlap kernel failed: {0}")]
    Kernel(#[from] KernelError),

    /// The call was cancelled by the caller.
    #[error("Reprojection cancelled")]
    Cancelled,
}

impl ReprojectError {
    /// Returns the error's class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReprojectError::InvalidWorkerCount(_)
            | ReprojectError::InvalidParallelism(_)
            | ReprojectError::PoolCreation { .. } => ErrorKind::Configuration,
            ReprojectError::UnsupportedSpatialRank(_)
            | ReprojectError::OutputShapeTooShort { .. }
            | ReprojectError::InputShapeTooShort { .. }
            | ReprojectError::RankMismatch { .. }
            | ReprojectError::LoopDimensionMismatch { .. }
            | ReprojectError::SpatialShapeMismatch { .. }
            | ReprojectError::EmptyAxis { .. }
            | ReprojectError::IncompleteResult { .. } => ErrorKind::Dimensionality,
            ReprojectError::Kernel(_) => ErrorKind::Kernel,
            ReprojectError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_display() {
        let err = ReprojectError::InvalidWorkerCount(-3);
        assert_eq!(
            err.to_string(),
            "The number of workers must be strictly positive, got -3"
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_loop_mismatch_display_names_shapes() {
        let err = ReprojectError::LoopDimensionMismatch {
            input: vec![5],
            output: vec![4],
        };
        let msg = err.to_string();
        assert!(msg.contains("[5]"));
        assert!(msg.contains("[4]"));
        assert_eq!(err.kind(), ErrorKind::Dimensionality);
    }

    #[test]
    fn test_kernel_error_conversion() {
        let err: ReprojectError = KernelError::ShapeMismatch {
            what: "xp_inout",
            expected: (3, 3),
            actual: (2, 2),
        }
        .into();
        assert!(matches!(err, ReprojectError::Kernel(_)));
        assert_eq!(err.kind(), ErrorKind::Kernel);
    }

    #[test]
    fn test_cancelled_kind() {
        assert_eq!(ReprojectError::Cancelled.kind(), ErrorKind::Cancelled);
    }
}
