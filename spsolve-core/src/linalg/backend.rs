use super::sparse::CscMatrix;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("symbolic analysis failed: {0}")]
    AnalyzeFailed(String),
    #[error("numeric factorization failed: {0}")]
    FactorFailed(String),
    #[error("structurally singular matrix: {axis} {index} has no entries")]
    StructurallySingular { axis: &'static str, index: usize },
    #[error("numerically singular matrix")]
    NumericallySingular,
    #[error("right-hand side has {actual} values, expected {expected}")]
    RhsLength { expected: usize, actual: usize },
}

/// A direct sparse LU solver consumed as a strict analyze → factor → solve →
/// free sequence.
///
/// Handles are plain owned values; `free` consumes them. Callers go through
/// [`Factorization`](super::direct::Factorization), which guarantees `free` on
/// every exit path.
pub trait LuBackend: Sync {
    type Symbolic;
    type Numeric;

    fn name(&self) -> &'static str;

    /// Pattern-only analysis (ordering, fill-in).
    fn analyze(&self, mat: &CscMatrix) -> Result<Self::Symbolic, BackendError>;

    /// Numeric factorization against a previous analysis of the same pattern.
    fn factor(&self, mat: &CscMatrix, symbolic: &Self::Symbolic) -> Result<Self::Numeric, BackendError>;

    /// Solve in place for `nrhs` stacked right-hand sides of length `n`.
    fn solve(
        &self,
        symbolic: &Self::Symbolic,
        numeric: &Self::Numeric,
        n: usize,
        nrhs: usize,
        rhs: &mut [f64],
    ) -> Result<(), BackendError>;

    /// Release factorization state. `numeric` is `None` when factorization failed.
    fn free(&self, symbolic: Self::Symbolic, numeric: Option<Self::Numeric>) {
        drop(numeric);
        drop(symbolic);
    }
}
