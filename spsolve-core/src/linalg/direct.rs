//! Direct solve of one sparse system against stacked right-hand sides.
//!
//! The backend's analyze/factor/solve/free sequence is wrapped in
//! [`Factorization`], which owns both handles and releases them when it goes
//! out of scope, including when factorization or the solve fails.

use log::{debug, trace};

use super::backend::{BackendError, LuBackend};
use super::sparse::CscMatrix;

/// Symbolic and numeric factorization of one matrix, scoped to a single solve.
pub struct Factorization<'b, B: LuBackend> {
    backend: &'b B,
    n: usize,
    symbolic: Option<B::Symbolic>,
    numeric: Option<B::Numeric>,
}

impl<'b, B: LuBackend> Factorization<'b, B> {
    /// Analyze and factor `mat`.
    ///
    /// If factorization fails the symbolic handle is released before the
    /// error is returned.
    pub fn acquire(backend: &'b B, mat: &CscMatrix) -> Result<Self, BackendError> {
        let symbolic = backend.analyze(mat)?;
        let numeric = match backend.factor(mat, &symbolic) {
            Ok(numeric) => numeric,
            Err(e) => {
                trace!("{}: factorization failed, releasing analysis", backend.name());
                backend.free(symbolic, None);
                return Err(e);
            }
        };

        Ok(Self {
            backend,
            n: mat.n(),
            symbolic: Some(symbolic),
            numeric: Some(numeric),
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Solve in place for `nrhs` stacked columns of length `n`.
    pub fn solve_in_place(&self, nrhs: usize, rhs: &mut [f64]) -> Result<(), BackendError> {
        match (self.symbolic.as_ref(), self.numeric.as_ref()) {
            (Some(symbolic), Some(numeric)) => self.backend.solve(symbolic, numeric, self.n, nrhs, rhs),
            _ => Err(BackendError::FactorFailed("factorization already released".into())),
        }
    }
}

impl<B: LuBackend> Drop for Factorization<'_, B> {
    fn drop(&mut self) {
        if let Some(symbolic) = self.symbolic.take() {
            trace!("{}: releasing factorization (n={})", self.backend.name(), self.n);
            self.backend.free(symbolic, self.numeric.take());
        }
    }
}

/// Solve `mat · X = B` in place, where `rhs` holds the `nrhs` columns of `B`
/// stacked one after another.
///
/// Stateless: every call analyzes and factors from scratch. A solution with
/// non-finite entries is reported as [`BackendError::NumericallySingular`].
pub fn direct_solve<B: LuBackend>(
    backend: &B,
    mat: &CscMatrix,
    nrhs: usize,
    rhs: &mut [f64],
) -> Result<(), BackendError> {
    let n = mat.n();
    if rhs.len() != n * nrhs {
        return Err(BackendError::RhsLength {
            expected: n * nrhs,
            actual: rhs.len(),
        });
    }

    if n == 0 {
        return Ok(());
    }

    debug!(
        "{}: direct solve n={} nnz={} nrhs={}",
        backend.name(),
        n,
        mat.nnz(),
        nrhs
    );

    let factorization = Factorization::acquire(backend, mat)?;
    factorization.solve_in_place(nrhs, rhs)?;

    if rhs.iter().any(|v| !v.is_finite()) {
        return Err(BackendError::NumericallySingular);
    }
    Ok(())
}
