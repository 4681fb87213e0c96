//! Dense LU reference backend.
//!
//! Expands the CSC matrix into a dense `nalgebra` matrix and factors it with
//! partial pivoting. Only sensible for small systems; it exists as an
//! independent cross-check for the sparse backend.

use nalgebra::{DMatrix, DMatrixViewMut, Dyn, LU};

use crate::linalg::backend::{BackendError, LuBackend};
use crate::linalg::sparse::CscMatrix;

#[derive(Debug, Default, Clone, Copy)]
pub struct DenseLuBackend;

/// Dense analysis only records the order.
#[derive(Debug, Clone, Copy)]
pub struct DenseSymbolic {
    n: usize,
}

impl LuBackend for DenseLuBackend {
    type Symbolic = DenseSymbolic;
    type Numeric = LU<f64, Dyn, Dyn>;

    fn name(&self) -> &'static str {
        "dense-lu"
    }

    fn analyze(&self, mat: &CscMatrix) -> Result<Self::Symbolic, BackendError> {
        Ok(DenseSymbolic { n: mat.n() })
    }

    fn factor(&self, mat: &CscMatrix, symbolic: &Self::Symbolic) -> Result<Self::Numeric, BackendError> {
        if mat.n() != symbolic.n {
            return Err(BackendError::FactorFailed(format!(
                "matrix order {} does not match analysis order {}",
                mat.n(),
                symbolic.n
            )));
        }

        let mut dense = DMatrix::<f64>::zeros(symbolic.n, symbolic.n);
        for (i, j, v) in mat.iter() {
            dense[(i, j)] += v;
        }

        let lu = dense.lu();
        if !lu.is_invertible() {
            return Err(BackendError::NumericallySingular);
        }
        Ok(lu)
    }

    fn solve(
        &self,
        symbolic: &Self::Symbolic,
        numeric: &Self::Numeric,
        n: usize,
        nrhs: usize,
        rhs: &mut [f64],
    ) -> Result<(), BackendError> {
        if n != symbolic.n || rhs.len() != n * nrhs {
            return Err(BackendError::RhsLength {
                expected: symbolic.n * nrhs,
                actual: rhs.len(),
            });
        }

        let mut view = DMatrixViewMut::from_slice(rhs, n, nrhs);
        if numeric.solve_mut(&mut view) {
            Ok(())
        } else {
            Err(BackendError::NumericallySingular)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse::CooMatrix;

    #[test]
    fn test_dense_backend_two_rhs() {
        // A = [[4, 1], [2, 3]]; columns of B solve to [1, 2] and [0, 1].
        let a = CooMatrix::from_triplets(2, vec![(0, 0, 4.0), (0, 1, 1.0), (1, 0, 2.0), (1, 1, 3.0)])
            .unwrap()
            .to_csc()
            .unwrap();
        let backend = DenseLuBackend;
        let symbolic = backend.analyze(&a).unwrap();
        let numeric = backend.factor(&a, &symbolic).unwrap();

        let mut rhs = vec![6.0, 8.0, 1.0, 3.0];
        backend.solve(&symbolic, &numeric, 2, 2, &mut rhs).unwrap();

        let expected = [1.0, 2.0, 0.0, 1.0];
        for (got, want) in rhs.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-12, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_dense_backend_zero_matrix_is_singular() {
        let a = CooMatrix::from_triplets(2, vec![(0, 0, 0.0), (1, 1, 0.0)])
            .unwrap()
            .to_csc()
            .unwrap();
        let backend = DenseLuBackend;
        let symbolic = backend.analyze(&a).unwrap();
        assert!(matches!(
            backend.factor(&a, &symbolic),
            Err(BackendError::NumericallySingular)
        ));
    }
}
