//! Batched forward solve.
//!
//! Each batch item is coalesced, converted to CSC, flattened into its own
//! right-hand-side buffer and solved by the direct adapter. Items share no
//! mutable state, so the per-item map runs either sequentially or across a
//! rayon pool depending on [`ExecutionStrategy`].

use std::time::Instant;

use log::{debug, info, warn};
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::{SolveError, SolveResult};
use crate::linalg::backend::LuBackend;
use crate::linalg::backends::{DenseLuBackend, FaerLuBackend};
use crate::linalg::direct::direct_solve;
use crate::linalg::sparse::CooMatrix;
use crate::problem::{BackendKind, DenseBatch, ExecutionStrategy, SolveSettings, SparseBatch};

/// Solve one system `a · X = b` for all columns of `b`.
///
/// The solution has the shape of `b`.
pub fn solve_item<B: LuBackend>(
    backend: &B,
    a: &CooMatrix,
    b: &DMatrix<f64>,
) -> SolveResult<DMatrix<f64>> {
    let n = a.n();
    if b.nrows() != n {
        return Err(SolveError::ShapeMismatch(format!(
            "'b' has {} rows but 'A' has order {}",
            b.nrows(),
            n
        )));
    }
    let k = b.ncols();

    let csc = a.coalesce().to_csc()?;

    // Fresh buffer per item: the backend overwrites it in place.
    let mut rhs = b.as_slice().to_vec();
    direct_solve(backend, &csc, k, &mut rhs)?;

    Ok(DMatrix::from_vec(n, k, rhs))
}

/// Batched sparse solver configured by [`SolveSettings`].
#[derive(Debug, Clone, Default)]
pub struct BatchSolver {
    settings: SolveSettings,
}

impl BatchSolver {
    pub fn new(settings: SolveSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SolveSettings {
        &self.settings
    }

    /// Solve every item, failing on the lowest-indexed failing item.
    pub fn solve(&self, a: &SparseBatch, b: &DenseBatch) -> SolveResult<DenseBatch> {
        let start = Instant::now();
        let solutions = self
            .solve_each(a, b)?
            .into_iter()
            .collect::<SolveResult<Vec<_>>>()?;

        if self.settings.verbose {
            info!(
                "solved batch of {} (n={}, k={}) with {} in {:.3} ms",
                a.len(),
                a.n(),
                b.cols(),
                self.settings.backend,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
        DenseBatch::new(a.n(), b.cols(), solutions)
    }

    /// Solve every item and report each outcome separately.
    ///
    /// The outer error covers batch-level problems (mismatched batch sizes or
    /// orders, thread pool creation); item failures are returned in place and
    /// carry their batch index.
    pub fn solve_each(
        &self,
        a: &SparseBatch,
        b: &DenseBatch,
    ) -> SolveResult<Vec<SolveResult<DMatrix<f64>>>> {
        check_operands(a, b)?;
        match self.settings.backend {
            BackendKind::Faer => self.solve_each_with(&FaerLuBackend, a, b),
            BackendKind::Dense => self.solve_each_with(&DenseLuBackend, a, b),
        }
    }

    fn solve_each_with<B: LuBackend>(
        &self,
        backend: &B,
        a: &SparseBatch,
        b: &DenseBatch,
    ) -> SolveResult<Vec<SolveResult<DMatrix<f64>>>> {
        self.map_items(a.len(), |idx| {
            let (a_item, b_item) = match (a.get(idx), b.get(idx)) {
                (Some(a_item), Some(b_item)) => (a_item, b_item),
                _ => {
                    return Err(SolveError::ShapeMismatch(format!("batch item {} missing", idx)));
                }
            };
            debug!(
                "item {}: n={} nnz={} k={}",
                idx,
                a_item.n(),
                a_item.nnz(),
                b_item.ncols()
            );
            solve_item(backend, a_item, b_item).map_err(|e| {
                warn!("item {} failed: {}", idx, e);
                e.at_item(idx)
            })
        })
    }

    /// Map `f` over batch indices `0..len` according to the execution strategy.
    ///
    /// Results are returned in index order regardless of scheduling.
    pub fn map_items<T, F>(&self, len: usize, f: F) -> SolveResult<Vec<SolveResult<T>>>
    where
        T: Send,
        F: Fn(usize) -> SolveResult<T> + Sync + Send,
    {
        match self.settings.strategy {
            ExecutionStrategy::Sequential => Ok((0..len).map(f).collect()),
            ExecutionStrategy::Parallel { threads: 0 } => {
                Ok((0..len).into_par_iter().map(f).collect())
            }
            ExecutionStrategy::Parallel { threads } => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                Ok(pool.install(|| (0..len).into_par_iter().map(f).collect()))
            }
        }
    }
}

/// Validate batch-level operand shapes.
pub fn check_operands(a: &SparseBatch, b: &DenseBatch) -> SolveResult<()> {
    let (batch, rows, _) = b.shape();
    if a.len() != batch {
        return Err(SolveError::ShapeMismatch(format!(
            "'A' has batch size {} but 'b' has batch size {}",
            a.len(),
            batch
        )));
    }
    if batch > 0 && rows != a.n() {
        return Err(SolveError::ShapeMismatch(format!(
            "'b' has {} rows but 'A' has order {}",
            rows,
            a.n()
        )));
    }
    if a.n() > u32::MAX as usize {
        return Err(SolveError::ShapeMismatch(format!(
            "matrix order {} exceeds 32-bit index range",
            a.n()
        )));
    }
    Ok(())
}

/// Per-item residual `max |A x - b|`.
pub fn residual_norm(a: &SparseBatch, x: &DenseBatch, b: &DenseBatch) -> SolveResult<Vec<f64>> {
    check_operands(a, b)?;
    if x.shape() != b.shape() {
        return Err(SolveError::ShapeMismatch(format!(
            "'x' has shape {:?} but 'b' has shape {:?}",
            x.shape(),
            b.shape()
        )));
    }
    a.iter()
        .zip(x.iter())
        .zip(b.iter())
        .map(|((a_item, x_item), b_item)| {
            let ax = a_item.matmul_dense(x_item)?;
            Ok(crate::util::max_abs_diff(&ax, b_item))
        })
        .collect()
}
