//! Backward pass of the batched solve.
//!
//! For `X = A⁻¹ B` and an upstream gradient `G = ∂L/∂X`:
//!
//! ```text
//! ∂L/∂B = A⁻ᵗ G
//! ∂L/∂A = -(∂L/∂B) Xᵗ, evaluated only on A's stored positions
//! ```
//!
//! The gradient with respect to `A` is returned as a sparse matrix sharing
//! `A`'s index arrays, one value per stored triplet (duplicates included).

use log::{debug, info, warn};
use nalgebra::DMatrix;
use std::time::Instant;

use crate::batch::{check_operands, BatchSolver};
use crate::error::{SolveError, SolveResult};
use crate::linalg::sparse::CooMatrix;
use crate::problem::{DenseBatch, SparseBatch};

/// Gradients of the loss with respect to both solve operands.
#[derive(Debug, Clone)]
pub struct Gradients {
    /// Same pattern as `A`.
    pub grad_a: SparseBatch,
    /// Same shape as `b`.
    pub grad_b: DenseBatch,
}

/// Gradient with respect to the stored entries of `a`.
///
/// Entry `p` receives `-Σ_c grad_b[rows[p], c] · x[cols[p], c]`.
pub fn pattern_gradient(
    a: &CooMatrix,
    grad_b: &DMatrix<f64>,
    x: &DMatrix<f64>,
) -> SolveResult<CooMatrix> {
    let n = a.n();
    if grad_b.nrows() != n || x.nrows() != n || grad_b.ncols() != x.ncols() {
        return Err(SolveError::ShapeMismatch(format!(
            "gradient {}×{} and solution {}×{} do not match order {}",
            grad_b.nrows(),
            grad_b.ncols(),
            x.nrows(),
            x.ncols(),
            n
        )));
    }

    let values = a
        .rows()
        .iter()
        .zip(a.cols())
        .map(|(&i, &j)| -grad_b.row(i).dot(&x.row(j)))
        .collect();
    a.with_values(values)
}

/// Compute `(∂L/∂A, ∂L/∂B)` given the forward inputs `a`, `b`, the forward
/// output `x` and the upstream gradient `grad_x`.
pub fn backward(
    solver: &BatchSolver,
    grad_x: &DenseBatch,
    a: &SparseBatch,
    b: &DenseBatch,
    x: &DenseBatch,
) -> SolveResult<Gradients> {
    check_operands(a, b)?;
    if grad_x.shape() != b.shape() || x.shape() != b.shape() {
        return Err(SolveError::ShapeMismatch(format!(
            "'grad' has shape {:?} and 'x' has shape {:?}, expected {:?}",
            grad_x.shape(),
            x.shape(),
            b.shape()
        )));
    }

    let start = Instant::now();
    debug!("backward: batch={} n={} k={}", a.len(), a.n(), b.cols());

    let grad_b = solver.solve(&a.transpose(), grad_x)?;

    let grad_a = solver
        .map_items(a.len(), |idx| {
            let item = match (a.get(idx), grad_b.get(idx), x.get(idx)) {
                (Some(a_item), Some(gb), Some(x_item)) => pattern_gradient(a_item, gb, x_item),
                _ => Err(SolveError::ShapeMismatch(format!("batch item {} missing", idx))),
            };
            item.map_err(|e| {
                warn!("item {} gradient failed: {}", idx, e);
                e.at_item(idx)
            })
        })?
        .into_iter()
        .collect::<SolveResult<Vec<_>>>()?;

    if solver.settings().verbose {
        info!(
            "backward pass for batch of {} in {:.3} ms",
            a.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    Ok(Gradients {
        grad_a: SparseBatch::new(a.n(), grad_a)?,
        grad_b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_gradient_diagonal() {
        // A = diag(2, 4), X = [1, 1]ᵗ, grad_b = [0.5, 0.25]ᵗ
        let a = CooMatrix::from_triplets(2, vec![(0, 0, 2.0), (1, 1, 4.0)]).unwrap();
        let x = DMatrix::from_column_slice(2, 1, &[1.0, 1.0]);
        let gb = DMatrix::from_column_slice(2, 1, &[0.5, 0.25]);
        let ga = pattern_gradient(&a, &gb, &x).unwrap();
        assert!(ga.same_pattern(&a));
        assert_eq!(ga.values(), &[-0.5, -0.25]);
    }

    #[test]
    fn test_pattern_gradient_keeps_duplicates() {
        let a = CooMatrix::from_triplets(2, vec![(0, 1, 1.0), (0, 1, 2.0)]).unwrap();
        let x = DMatrix::from_column_slice(2, 2, &[0.0, 3.0, 0.0, 1.0]);
        let gb = DMatrix::from_column_slice(2, 2, &[2.0, 0.0, 1.0, 0.0]);
        let ga = pattern_gradient(&a, &gb, &x).unwrap();
        // -(2·3 + 1·1) for both copies
        assert_eq!(ga.values(), &[-7.0, -7.0]);
    }

    #[test]
    fn test_pattern_gradient_shape_mismatch() {
        let a = CooMatrix::empty(2);
        let x = DMatrix::zeros(2, 1);
        let gb = DMatrix::zeros(2, 2);
        assert!(pattern_gradient(&a, &gb, &x).unwrap_err().is_malformed_input());
    }

    #[test]
    fn test_backward_diagonal() {
        let a = SparseBatch::new(
            2,
            vec![CooMatrix::from_triplets(2, vec![(0, 0, 2.0), (1, 1, 4.0)]).unwrap()],
        )
        .unwrap();
        let b = DenseBatch::from_items(vec![DMatrix::from_column_slice(2, 1, &[2.0, 4.0])]).unwrap();
        let solver = BatchSolver::default();
        let x = solver.solve(&a, &b).unwrap();
        let grad_x = DenseBatch::from_fn(1, 2, 1, |_, _, _| 1.0);

        let grads = backward(&solver, &grad_x, &a, &b, &x).unwrap();
        let gb = grads.grad_b.get(0).unwrap();
        assert!((gb[(0, 0)] - 0.5).abs() < 1e-12);
        assert!((gb[(1, 0)] - 0.25).abs() < 1e-12);

        let ga = grads.grad_a.get(0).unwrap();
        assert!((ga.values()[0] + 0.5).abs() < 1e-12);
        assert!((ga.values()[1] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_backward_rejects_grad_shape() {
        let a = SparseBatch::new(
            2,
            vec![CooMatrix::from_triplets(2, vec![(0, 0, 1.0), (1, 1, 1.0)]).unwrap()],
        )
        .unwrap();
        let b = DenseBatch::zeros(1, 2, 1);
        let grad_x = DenseBatch::zeros(1, 2, 3);
        let err = backward(&BatchSolver::default(), &grad_x, &a, &b, &b).unwrap_err();
        assert!(err.is_malformed_input());
    }
}
