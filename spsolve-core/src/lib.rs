//! spsolve: batched sparse linear solves with reverse-mode gradients.
//!
//! Solves `A[b] · X[b] = B[b]` for a batch of square sparse matrices given
//! as coordinate triplets and a batch of dense right-hand sides, and computes
//! the gradients of a downstream loss with respect to both operands.
//!
//! # Algorithm
//!
//! Every batch item is handled independently:
//!
//! 1. Coalesce the triplets and convert them to CSC with a counting sort.
//! 2. Analyze, factor and solve with a sparse LU backend (faer by default).
//! 3. Release the factorization as soon as the item is solved.
//!
//! The backward pass reuses the forward solver on `Aᵗ` and evaluates
//! `-(∂L/∂B) Xᵗ` only on the stored positions of `A`.
//!
//! # Example
//!
//! ```
//! use nalgebra::DMatrix;
//! use spsolve_core::{CooMatrix, DenseBatch, SparseBatch};
//!
//! let a = SparseBatch::new(
//!     2,
//!     vec![CooMatrix::from_triplets(2, vec![(0, 0, 2.0), (1, 1, 3.0)])?],
//! )?;
//! let b = DenseBatch::from_items(vec![DMatrix::from_column_slice(2, 1, &[4.0, 9.0])])?;
//!
//! let (x, ctx) = spsolve_core::solve(&a, &b)?;
//! assert!((x.get(0).unwrap()[(1, 0)] - 3.0).abs() < 1e-12);
//!
//! let grad = DenseBatch::from_fn(1, 2, 1, |_, _, _| 1.0);
//! let grads = ctx.backward(&grad)?;
//! assert!(grads.grad_a.same_pattern(&a));
//! # Ok::<(), spsolve_core::SolveError>(())
//! ```

#![warn(clippy::all)]

pub mod batch;
pub mod error;
pub mod grad;
pub mod linalg;
pub mod problem;
pub mod util;

pub use batch::{residual_norm, BatchSolver};
pub use error::{IndexAxis, SolveError, SolveResult};
pub use grad::{pattern_gradient, Gradients};
pub use linalg::backend::{BackendError, LuBackend};
pub use linalg::backends::{DenseLuBackend, FaerLuBackend};
pub use linalg::direct::{direct_solve, Factorization};
pub use linalg::sparse::{coo_to_csc, CooMatrix, CscMatrix};
pub use problem::{BackendKind, DenseBatch, ExecutionStrategy, SolveSettings, SparseBatch};

/// Solve `a[i] · x[i] = b[i]` for every batch item with default settings.
pub fn forward(a: &SparseBatch, b: &DenseBatch) -> SolveResult<DenseBatch> {
    BatchSolver::default().solve(a, b)
}

/// Gradients of the loss with respect to `a` and `b`, given the forward
/// output `x` and the upstream gradient `grad_x`, with default settings.
pub fn backward(
    grad_x: &DenseBatch,
    a: &SparseBatch,
    b: &DenseBatch,
    x: &DenseBatch,
) -> SolveResult<Gradients> {
    grad::backward(&BatchSolver::default(), grad_x, a, b, x)
}

/// Forward inputs and output saved for a later backward pass.
#[derive(Debug, Clone)]
pub struct SolveContext {
    solver: BatchSolver,
    a: SparseBatch,
    b: DenseBatch,
    x: DenseBatch,
}

impl SolveContext {
    /// Run the forward solve and keep `(a, b, x)` for [`SolveContext::backward`].
    pub fn forward(solver: BatchSolver, a: SparseBatch, b: DenseBatch) -> SolveResult<Self> {
        let x = solver.solve(&a, &b)?;
        Ok(Self { solver, a, b, x })
    }

    pub fn solution(&self) -> &DenseBatch {
        &self.x
    }

    pub fn matrices(&self) -> &SparseBatch {
        &self.a
    }

    pub fn rhs(&self) -> &DenseBatch {
        &self.b
    }

    pub fn backward(&self, grad_x: &DenseBatch) -> SolveResult<Gradients> {
        grad::backward(&self.solver, grad_x, &self.a, &self.b, &self.x)
    }
}

/// Forward solve returning the solution and a context for the backward pass.
///
/// The inputs are cloned into the context; `CooMatrix` shares its index
/// arrays, so only the values are copied.
pub fn solve(a: &SparseBatch, b: &DenseBatch) -> SolveResult<(DenseBatch, SolveContext)> {
    let ctx = SolveContext::forward(BatchSolver::default(), a.clone(), b.clone())?;
    Ok((ctx.x.clone(), ctx))
}
