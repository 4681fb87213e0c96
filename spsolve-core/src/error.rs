//! Error types for batched sparse solves.
//!
//! Two classes of failure are kept apart: malformed input, which is detected
//! before any factorization is attempted, and solver failures reported by the
//! factorization backend.

use thiserror::Error;

use crate::linalg::backend::BackendError;

/// Which index of a triplet was out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAxis {
    Row,
    Col,
}

impl std::fmt::Display for IndexAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexAxis::Row => write!(f, "row"),
            IndexAxis::Col => write!(f, "column"),
        }
    }
}

/// Errors returned by the forward and backward solves.
#[derive(Debug, Error)]
pub enum SolveError {
    /// A triplet index lies outside `[0, bound)`.
    #[error("Malformed input: {axis} index {index} out of range [0, {bound})")]
    IndexOutOfRange {
        axis: IndexAxis,
        index: usize,
        bound: usize,
    },

    /// Operand shapes are inconsistent (non-square `A`, `A`/`b` mismatch, ...).
    #[error("Malformed input: {0}")]
    ShapeMismatch(String),

    /// The factorization backend rejected the system.
    #[error("Solve failed: {0}")]
    Backend(#[from] BackendError),

    /// A failure attributed to one batch item.
    #[error("Batch item {index}: {source}")]
    Item {
        index: usize,
        #[source]
        source: Box<SolveError>,
    },

    /// The dedicated worker pool could not be created.
    #[error("Thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl SolveError {
    /// Attach a batch item index to this error.
    pub fn at_item(self, index: usize) -> Self {
        SolveError::Item {
            index,
            source: Box::new(self),
        }
    }

    /// Batch item the error belongs to, if any.
    pub fn item_index(&self) -> Option<usize> {
        match self {
            SolveError::Item { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The error with any batch item context stripped.
    pub fn root(&self) -> &SolveError {
        match self {
            SolveError::Item { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for errors raised before the backend was invoked.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self.root(),
            SolveError::IndexOutOfRange { .. } | SolveError::ShapeMismatch(_)
        )
    }

    /// True for analysis, factorization or solve failures reported by the backend.
    pub fn is_solver_failure(&self) -> bool {
        matches!(self.root(), SolveError::Backend(_))
    }
}

/// Convenience alias for `Result<T, SolveError>`.
pub type SolveResult<T> = Result<T, SolveError>;
