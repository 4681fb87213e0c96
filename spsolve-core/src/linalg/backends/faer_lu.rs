//! Faer sparse LU backend.
//!
//! Default factorization backend. Symbolic analysis computes a fill-reducing
//! column ordering and elimination structure from the pattern alone; numeric
//! factorization uses faer's partial-pivoting sparse LU.

use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::warn;

use faer::linalg::solvers::SolveCore;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::{SparseColMatRef, SymbolicSparseColMatRef};
use faer::{Conj, MatMut};

use crate::linalg::backend::{BackendError, LuBackend};
use crate::linalg::sparse::CscMatrix;

/// Faer sparse LU backend.
///
/// Stateless: every handle it returns is owned by the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaerLuBackend;

/// faer requires strictly increasing row indices within each column.
fn with_sorted_columns(mat: &CscMatrix) -> Cow<'_, CscMatrix> {
    if mat.has_sorted_columns() {
        Cow::Borrowed(mat)
    } else {
        let mut sorted = mat.clone();
        sorted.sort_columns();
        Cow::Owned(sorted)
    }
}

fn symbolic_view(mat: &CscMatrix) -> SymbolicSparseColMatRef<'_, usize> {
    SymbolicSparseColMatRef::new_checked(mat.n(), mat.n(), mat.col_ptr(), None, mat.row_idx())
}

impl LuBackend for FaerLuBackend {
    type Symbolic = SymbolicLu<usize>;
    type Numeric = Lu<usize, f64>;

    fn name(&self) -> &'static str {
        "faer-lu"
    }

    fn analyze(&self, mat: &CscMatrix) -> Result<Self::Symbolic, BackendError> {
        if let Some(index) = mat.first_empty_column() {
            return Err(BackendError::StructurallySingular { axis: "column", index });
        }
        if let Some(index) = mat.first_empty_row() {
            return Err(BackendError::StructurallySingular { axis: "row", index });
        }

        let mat = with_sorted_columns(mat);
        if !mat.has_sorted_columns() {
            return Err(BackendError::AnalyzeFailed(
                "duplicate entries in a column; coalesce before converting".into(),
            ));
        }
        SymbolicLu::try_new(symbolic_view(&mat))
            .map_err(|e| BackendError::AnalyzeFailed(format!("faer symbolic LU: {:?}", e)))
    }

    fn factor(&self, mat: &CscMatrix, symbolic: &Self::Symbolic) -> Result<Self::Numeric, BackendError> {
        if let Some(j) = (0..mat.n()).find(|&j| mat.column(j).1.iter().all(|&v| v == 0.0)) {
            warn!("faer-lu: column {} is numerically zero", j);
            return Err(BackendError::NumericallySingular);
        }

        let mat = with_sorted_columns(mat);
        let view = SparseColMatRef::new(symbolic_view(&mat), mat.values());

        // faer's simplicial LU panics on an exactly zero pivot instead of returning an error.
        let factored = catch_unwind(AssertUnwindSafe(|| {
            Lu::try_new_with_symbolic(symbolic.clone(), view)
        }));
        match factored {
            Ok(lu) => lu.map_err(|e| BackendError::FactorFailed(format!("faer numeric LU: {:?}", e))),
            Err(_) => {
                warn!("faer-lu: zero pivot during numeric factorization");
                Err(BackendError::NumericallySingular)
            }
        }
    }

    fn solve(
        &self,
        _symbolic: &Self::Symbolic,
        numeric: &Self::Numeric,
        n: usize,
        nrhs: usize,
        rhs: &mut [f64],
    ) -> Result<(), BackendError> {
        if rhs.len() != n * nrhs {
            return Err(BackendError::RhsLength {
                expected: n * nrhs,
                actual: rhs.len(),
            });
        }
        if nrhs == 0 {
            return Ok(());
        }

        let mut rhs_mat = MatMut::from_column_major_slice_mut(rhs, n, nrhs);
        numeric.solve_in_place_with_conj(Conj::No, rhs_mat.as_mut());
        Ok(())
    }
}
