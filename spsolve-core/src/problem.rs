//! Batch data structures and solver settings.
//!
//! A batched solve works on a [`SparseBatch`] of `n × n` coefficient
//! matrices and a [`DenseBatch`] of `(n, k)` right-hand sides:
//!
//! ```text
//! A[b] · X[b] = B[b]      for b in 0..batch
//! ```

use std::fmt;
use std::str::FromStr;

use nalgebra::DMatrix;

use crate::error::{SolveError, SolveResult};
use crate::linalg::sparse::CooMatrix;
use crate::util::{env_flag, env_parse, max_abs_diff};

/// Batch of square sparse matrices sharing the order `n`.
///
/// Items may have different sparsity patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseBatch {
    n: usize,
    items: Vec<CooMatrix>,
}

impl SparseBatch {
    /// Build a batch, checking that every item has order `n`.
    pub fn new(n: usize, items: Vec<CooMatrix>) -> SolveResult<Self> {
        if let Some((b, item)) = items.iter().enumerate().find(|(_, item)| item.n() != n) {
            return Err(SolveError::ShapeMismatch(format!(
                "batch item {} has order {}, expected {}",
                b,
                item.n(),
                n
            )));
        }
        Ok(Self { n, items })
    }

    /// Sparse batch holding the exactly-nonzero entries of a dense batch.
    pub fn from_dense(dense: &DenseBatch) -> SolveResult<Self> {
        let (_, rows, cols) = dense.shape();
        if rows != cols {
            return Err(SolveError::ShapeMismatch(format!(
                "'A' should be a batch of square matrices, got ({}, {})",
                rows, cols
            )));
        }
        let items = dense
            .iter()
            .map(CooMatrix::from_dense)
            .collect::<SolveResult<Vec<_>>>()?;
        Self::new(rows, items)
    }

    /// Concatenate batches of the same order along the batch axis.
    pub fn concat(batches: &[SparseBatch]) -> SolveResult<Self> {
        let n = batches.first().map_or(0, |b| b.n);
        let items = batches.iter().flat_map(|b| b.items.iter().cloned()).collect();
        Self::new(n, items)
    }

    /// Matrix order shared by all items.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, b: usize) -> Option<&CooMatrix> {
        self.items.get(b)
    }

    pub fn items(&self) -> &[CooMatrix] {
        &self.items
    }

    pub fn into_items(self) -> Vec<CooMatrix> {
        self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CooMatrix> {
        self.items.iter()
    }

    /// Transpose every item.
    pub fn transpose(&self) -> Self {
        Self {
            n: self.n,
            items: self.items.iter().map(CooMatrix::transpose).collect(),
        }
    }

    /// True if every item stores the same index arrays as the matching item of `other`.
    pub fn same_pattern(&self, other: &SparseBatch) -> bool {
        self.len() == other.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|(a, b)| a.same_pattern(b))
    }

    pub fn to_dense(&self) -> DenseBatch {
        DenseBatch {
            rows: self.n,
            cols: self.n,
            items: self.items.iter().map(CooMatrix::to_dense).collect(),
        }
    }
}

/// Batch of dense matrices with a common shape: a `(batch, rows, cols)` array.
///
/// Items are column-major, so the flattened storage of an `(n, k)` item is
/// its `k` columns stacked one after another.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseBatch {
    rows: usize,
    cols: usize,
    items: Vec<DMatrix<f64>>,
}

impl DenseBatch {
    /// Build a batch of `rows × cols` items, checking every item's shape.
    pub fn new(rows: usize, cols: usize, items: Vec<DMatrix<f64>>) -> SolveResult<Self> {
        if let Some((b, item)) = items
            .iter()
            .enumerate()
            .find(|(_, item)| item.shape() != (rows, cols))
        {
            return Err(SolveError::ShapeMismatch(format!(
                "batch item {} has shape {:?}, expected ({}, {})",
                b,
                item.shape(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, items })
    }

    /// Build a batch taking the item shape from the first item.
    pub fn from_items(items: Vec<DMatrix<f64>>) -> SolveResult<Self> {
        let (rows, cols) = items.first().map_or((0, 0), |m| m.shape());
        Self::new(rows, cols, items)
    }

    pub fn zeros(batch: usize, rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            items: (0..batch).map(|_| DMatrix::zeros(rows, cols)).collect(),
        }
    }

    /// Build from `f(b, i, j)`.
    pub fn from_fn<F>(batch: usize, rows: usize, cols: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> f64,
    {
        let items = (0..batch)
            .map(|b| DMatrix::from_fn(rows, cols, |i, j| f(b, i, j)))
            .collect();
        Self { rows, cols, items }
    }

    /// Concatenate batches of the same item shape along the batch axis.
    pub fn concat(batches: &[DenseBatch]) -> SolveResult<Self> {
        let (rows, cols) = batches.first().map_or((0, 0), |b| (b.rows, b.cols));
        let items = batches.iter().flat_map(|b| b.items.iter().cloned()).collect();
        Self::new(rows, cols, items)
    }

    /// `(batch, rows, cols)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.items.len(), self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, b: usize) -> Option<&DMatrix<f64>> {
        self.items.get(b)
    }

    pub fn get_mut(&mut self, b: usize) -> Option<&mut DMatrix<f64>> {
        self.items.get_mut(b)
    }

    pub fn items(&self) -> &[DMatrix<f64>] {
        &self.items
    }

    pub fn into_items(self) -> Vec<DMatrix<f64>> {
        self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DMatrix<f64>> {
        self.items.iter()
    }

    /// Copy item `b` into a fresh buffer of `rows * cols` values, columns stacked.
    pub fn flatten_item(&self, b: usize) -> Option<Vec<f64>> {
        self.items.get(b).map(|m| m.as_slice().to_vec())
    }

    /// Sum of all entries times the matching entries of `weights`.
    pub fn dot(&self, weights: &DenseBatch) -> f64 {
        self.items
            .iter()
            .zip(weights.items.iter())
            .map(|(a, w)| a.dot(w))
            .sum()
    }

    /// Largest absolute elementwise difference; infinite on shape mismatch.
    pub fn max_abs_diff(&self, other: &DenseBatch) -> f64 {
        if self.shape() != other.shape() {
            return f64::INFINITY;
        }
        self.items
            .iter()
            .zip(other.items.iter())
            .map(|(a, b)| max_abs_diff(a, b))
            .fold(0.0, f64::max)
    }
}

/// How batch items are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// One item after another on the calling thread.
    Sequential,

    /// Items mapped across a rayon pool.
    /// `threads == 0` uses the global pool; otherwise a dedicated pool of that size.
    Parallel { threads: usize },
}

impl ExecutionStrategy {
    /// `0` → global pool, `1` → sequential, `t` → dedicated pool of `t` threads.
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            1 => ExecutionStrategy::Sequential,
            t => ExecutionStrategy::Parallel { threads: t },
        }
    }
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        ExecutionStrategy::Parallel { threads: 0 }
    }
}

/// Factorization backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// faer sparse LU
    #[default]
    Faer,

    /// Dense partial-pivoting LU; reference only, O(n³) per item
    Dense,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Faer => write!(f, "faer"),
            BackendKind::Dense => write!(f, "dense"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "faer" | "sparse" => Ok(BackendKind::Faer),
            "dense" => Ok(BackendKind::Dense),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct SolveSettings {
    /// Batch item scheduling
    pub strategy: ExecutionStrategy,

    /// Factorization backend
    pub backend: BackendKind,

    /// Log per-call timing at info level
    pub verbose: bool,
}

impl Default for SolveSettings {
    fn default() -> Self {
        // SPSOLVE_THREADS=1 forces sequential execution, 0 or unset uses the global pool
        let strategy = env_parse::<usize>("SPSOLVE_THREADS")
            .map(ExecutionStrategy::from_threads)
            .unwrap_or_default();

        let backend = env_parse::<BackendKind>("SPSOLVE_BACKEND").unwrap_or_default();

        Self {
            strategy,
            backend,
            verbose: env_flag("SPSOLVE_VERBOSE").unwrap_or(false),
        }
    }
}
