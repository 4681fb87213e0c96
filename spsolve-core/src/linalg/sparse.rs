//! Sparse matrix types and operations.
//!
//! Matrices enter the solver as coordinate (COO) triplets and are handed to
//! the factorization backend in CSC (Compressed Sparse Column) format, which
//! is the standard input format for sparse direct solvers.

use std::sync::Arc;

use nalgebra::DMatrix;
use sprs::{CsMat, TriMat};

use crate::error::{IndexAxis, SolveError, SolveResult};

/// Square sparse matrix in coordinate (triplet) format.
///
/// Triplets are unordered and may contain duplicates until [`coalesce`] is
/// called. Index arrays are reference counted so that matrices sharing a
/// sparsity pattern (a gradient and its parameter, a matrix and its
/// transpose) do not copy them.
///
/// [`coalesce`]: CooMatrix::coalesce
#[derive(Debug, Clone, PartialEq)]
pub struct CooMatrix {
    n: usize,
    rows: Arc<[usize]>,
    cols: Arc<[usize]>,
    values: Vec<f64>,
}

impl CooMatrix {
    /// Build an `n × n` matrix from parallel triplet arrays.
    ///
    /// Fails if the arrays differ in length or an index lies outside `[0, n)`.
    pub fn new(n: usize, rows: Vec<usize>, cols: Vec<usize>, values: Vec<f64>) -> SolveResult<Self> {
        if rows.len() != values.len() || cols.len() != values.len() {
            return Err(SolveError::ShapeMismatch(format!(
                "triplet arrays have lengths rows={}, cols={}, values={}",
                rows.len(),
                cols.len(),
                values.len()
            )));
        }
        check_indices(&rows, n, IndexAxis::Row)?;
        check_indices(&cols, n, IndexAxis::Col)?;

        Ok(Self {
            n,
            rows: rows.into(),
            cols: cols.into(),
            values,
        })
    }

    /// Build an `n × n` matrix from `(row, col, value)` triplets.
    pub fn from_triplets<I>(n: usize, triplets: I) -> SolveResult<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut rows = Vec::new();
        let mut cols = Vec::new();
        let mut values = Vec::new();
        for (i, j, v) in triplets {
            rows.push(i);
            cols.push(j);
            values.push(v);
        }
        Self::new(n, rows, cols, values)
    }

    /// Sparse view of a dense square matrix, keeping entries that are exactly nonzero.
    pub fn from_dense(dense: &DMatrix<f64>) -> SolveResult<Self> {
        if dense.nrows() != dense.ncols() {
            return Err(SolveError::ShapeMismatch(format!(
                "matrix must be square, got {}×{}",
                dense.nrows(),
                dense.ncols()
            )));
        }
        let n = dense.nrows();
        let triplets = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .filter(|&(i, j)| dense[(i, j)] != 0.0)
            .map(|(i, j)| (i, j, dense[(i, j)]));
        Self::from_triplets(n, triplets)
    }

    /// An `n × n` matrix with no stored entries.
    pub fn empty(n: usize) -> Self {
        Self {
            n,
            rows: Arc::from(Vec::new()),
            cols: Arc::from(Vec::new()),
            values: Vec::new(),
        }
    }

    /// Matrix order.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of stored triplets (duplicates included).
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Iterate over `(row, col, value)` triplets in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .zip(self.values.iter())
            .map(|((&i, &j), &v)| (i, j, v))
    }

    /// Same sparsity pattern, new values.
    ///
    /// The index arrays are shared with `self`.
    pub fn with_values(&self, values: Vec<f64>) -> SolveResult<Self> {
        if values.len() != self.nnz() {
            return Err(SolveError::ShapeMismatch(format!(
                "expected {} values for the pattern, got {}",
                self.nnz(),
                values.len()
            )));
        }
        Ok(Self {
            n: self.n,
            rows: Arc::clone(&self.rows),
            cols: Arc::clone(&self.cols),
            values,
        })
    }

    /// True if both matrices store exactly the same index arrays.
    pub fn same_pattern(&self, other: &CooMatrix) -> bool {
        self.n == other.n && self.rows == other.rows && self.cols == other.cols
    }

    /// Transpose by swapping the index arrays.
    pub fn transpose(&self) -> Self {
        Self {
            n: self.n,
            rows: Arc::clone(&self.cols),
            cols: Arc::clone(&self.rows),
            values: self.values.clone(),
        }
    }

    /// True if triplets are sorted row-major with no duplicate positions.
    pub fn is_coalesced(&self) -> bool {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .zip(self.rows.iter().zip(self.cols.iter()).skip(1))
            .all(|(prev, next)| prev < next)
    }

    /// Sort triplets row-major and sum duplicate positions.
    ///
    /// Merging goes through `sprs::TriMat`, whose CSR conversion sums
    /// duplicates and sorts column indices within each row.
    pub fn coalesce(&self) -> Self {
        if self.is_coalesced() {
            return self.clone();
        }

        let tri = TriMat::from_triplets(
            (self.n, self.n),
            self.rows.to_vec(),
            self.cols.to_vec(),
            self.values.clone(),
        );
        let csr: CsMat<f64> = tri.to_csr();

        let mut rows = Vec::with_capacity(csr.nnz());
        let mut cols = Vec::with_capacity(csr.nnz());
        let mut values = Vec::with_capacity(csr.nnz());
        for (&v, (i, j)) in csr.iter() {
            rows.push(i);
            cols.push(j);
            values.push(v);
        }

        Self {
            n: self.n,
            rows: rows.into(),
            cols: cols.into(),
            values,
        }
    }

    /// Convert to CSC. The matrix must already be coalesced.
    pub fn to_csc(&self) -> SolveResult<CscMatrix> {
        coo_to_csc(self.n, &self.rows, &self.cols, &self.values)
    }

    /// Dense copy; duplicate entries are summed.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.n, self.n);
        for (i, j, v) in self.iter() {
            dense[(i, j)] += v;
        }
        dense
    }

    /// Sparse-dense product: `Y = A * X`.
    pub fn matmul_dense(&self, x: &DMatrix<f64>) -> SolveResult<DMatrix<f64>> {
        if x.nrows() != self.n {
            return Err(SolveError::ShapeMismatch(format!(
                "cannot multiply {n}×{n} sparse matrix by {}×{}",
                x.nrows(),
                x.ncols(),
                n = self.n
            )));
        }
        let mut y = DMatrix::zeros(self.n, x.ncols());
        for (i, j, v) in self.iter() {
            for c in 0..x.ncols() {
                y[(i, c)] += v * x[(j, c)];
            }
        }
        Ok(y)
    }
}

fn check_indices(indices: &[usize], bound: usize, axis: IndexAxis) -> SolveResult<()> {
    match indices.iter().find(|&&index| index >= bound) {
        Some(&index) => Err(SolveError::IndexOutOfRange { axis, index, bound }),
        None => Ok(()),
    }
}

/// Square sparse matrix in CSC format.
///
/// Entries `col_ptr[j]..col_ptr[j + 1]` of `row_idx`/`values` belong to
/// column `j`. Row indices within a column are not required to be sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    n: usize,
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CscMatrix {
    /// Matrix order.
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn col_ptr(&self) -> &[usize] {
        &self.col_ptr
    }

    pub fn row_idx(&self) -> &[usize] {
        &self.row_idx
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Row indices and values of column `j`.
    pub fn column(&self, j: usize) -> (&[usize], &[f64]) {
        let range = self.col_ptr[j]..self.col_ptr[j + 1];
        (&self.row_idx[range.clone()], &self.values[range])
    }

    /// Iterate over `(row, col, value)` column by column.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.n).flat_map(move |j| {
            let (rows, vals) = self.column(j);
            rows.iter().zip(vals.iter()).map(move |(&i, &v)| (i, j, v))
        })
    }

    /// True if row indices increase strictly within every column.
    pub fn has_sorted_columns(&self) -> bool {
        (0..self.n).all(|j| self.column(j).0.windows(2).all(|w| w[0] < w[1]))
    }

    /// Sort the row indices of every column, carrying values along.
    pub fn sort_columns(&mut self) {
        let mut scratch: Vec<(usize, f64)> = Vec::new();
        for j in 0..self.n {
            let (start, end) = (self.col_ptr[j], self.col_ptr[j + 1]);
            if end - start <= 1 {
                continue;
            }
            scratch.clear();
            scratch.extend(
                self.row_idx[start..end]
                    .iter()
                    .copied()
                    .zip(self.values[start..end].iter().copied()),
            );
            scratch.sort_by_key(|&(row, _)| row);
            for (k, &(row, val)) in scratch.iter().enumerate() {
                self.row_idx[start + k] = row;
                self.values[start + k] = val;
            }
        }
    }

    /// First column with no stored entries, if any.
    pub fn first_empty_column(&self) -> Option<usize> {
        (0..self.n).find(|&j| self.col_ptr[j] == self.col_ptr[j + 1])
    }

    /// First row with no stored entries, if any.
    pub fn first_empty_row(&self) -> Option<usize> {
        let mut seen = vec![false; self.n];
        for &i in &self.row_idx {
            seen[i] = true;
        }
        seen.iter().position(|&s| !s)
    }

    /// Convert to an `sprs` matrix (columns sorted as `sprs` requires).
    pub fn to_sprs(&self) -> CsMat<f64> {
        let mut sorted = self.clone();
        sorted.sort_columns();
        CsMat::new_csc(
            (self.n, self.n),
            sorted.col_ptr,
            sorted.row_idx,
            sorted.values,
        )
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut dense = DMatrix::zeros(self.n, self.n);
        for (i, j, v) in self.iter() {
            dense[(i, j)] += v;
        }
        dense
    }
}

/// Convert coalesced COO triplets of a square matrix to CSC.
///
/// Counting sort over columns in O(nnz + num_cols): histogram the columns,
/// turn counts into offsets, scatter each triplet at its column cursor, then
/// shift the advanced cursors back to the column starts. Within a column,
/// entries keep their input order.
///
/// Indices outside `[0, num_cols)` are rejected. Duplicate positions are
/// not merged; callers coalesce first.
pub fn coo_to_csc(
    num_cols: usize,
    rows: &[usize],
    cols: &[usize],
    values: &[f64],
) -> SolveResult<CscMatrix> {
    let nnz = values.len();
    if rows.len() != nnz || cols.len() != nnz {
        return Err(SolveError::ShapeMismatch(format!(
            "triplet arrays have lengths rows={}, cols={}, values={}",
            rows.len(),
            cols.len(),
            nnz
        )));
    }
    check_indices(cols, num_cols, IndexAxis::Col)?;
    check_indices(rows, num_cols, IndexAxis::Row)?;

    // Histogram
    let mut col_ptr = vec![0usize; num_cols + 1];
    for &j in cols {
        col_ptr[j] += 1;
    }

    // Exclusive prefix sum
    let mut cumsum = 0;
    for ptr in col_ptr.iter_mut().take(num_cols) {
        let count = *ptr;
        *ptr = cumsum;
        cumsum += count;
    }
    col_ptr[num_cols] = nnz;

    // Scatter
    let mut row_idx = vec![0usize; nnz];
    let mut csc_values = vec![0.0f64; nnz];
    for p in 0..nnz {
        let j = cols[p];
        let dest = col_ptr[j];
        row_idx[dest] = rows[p];
        csc_values[dest] = values[p];
        col_ptr[j] += 1;
    }

    // Restore: col_ptr[j] now holds the start of column j + 1
    let mut last = 0;
    for ptr in col_ptr.iter_mut() {
        let advanced = *ptr;
        *ptr = last;
        last = advanced;
    }

    Ok(CscMatrix {
        n: num_cols,
        col_ptr,
        row_idx,
        values: csc_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coo_to_csc_matches_sprs() {
        // [[0, 0, 0, 0],
        //  [5, 8, 0, 0],
        //  [0, 0, 3, 0],
        //  [0, 6, 0, 0]]
        let coo = CooMatrix::from_triplets(
            4,
            vec![(1, 0, 5.0), (1, 1, 8.0), (2, 2, 3.0), (3, 1, 6.0)],
        )
        .unwrap();
        let csc = coo.to_csc().unwrap();

        assert_eq!(csc.col_ptr(), &[0, 1, 3, 4, 4]);
        assert_eq!(csc.row_idx(), &[1, 1, 3, 2]);
        assert_eq!(csc.values(), &[5.0, 8.0, 6.0, 3.0]);

        let reference: CsMat<f64> = sprs::TriMat::from_triplets(
            (4, 4),
            vec![1, 1, 2, 3],
            vec![0, 1, 2, 1],
            vec![5.0, 8.0, 3.0, 6.0],
        )
        .to_csc();
        assert_eq!(csc.to_sprs(), reference);
    }

    #[test]
    fn test_coo_to_csc_empty() {
        let csc = coo_to_csc(3, &[], &[], &[]).unwrap();
        assert_eq!(csc.col_ptr(), &[0, 0, 0, 0]);
        assert_eq!(csc.nnz(), 0);
        assert_eq!(csc.first_empty_column(), Some(0));
    }

    #[test]
    fn test_coo_to_csc_rejects_out_of_range_column() {
        let err = coo_to_csc(2, &[0, 1], &[0, 2], &[1.0, 1.0]).unwrap_err();
        assert!(matches!(
            err,
            SolveError::IndexOutOfRange {
                axis: IndexAxis::Col,
                index: 2,
                bound: 2
            }
        ));
    }

    #[test]
    fn test_coo_to_csc_keeps_input_order_within_column() {
        let csc = coo_to_csc(2, &[1, 0], &[0, 0], &[2.0, 1.0]).unwrap();
        assert_eq!(csc.row_idx(), &[1, 0]);
        assert!(!csc.has_sorted_columns());

        let mut sorted = csc.clone();
        sorted.sort_columns();
        assert_eq!(sorted.row_idx(), &[0, 1]);
        assert_eq!(sorted.values(), &[1.0, 2.0]);
    }

    #[test]
    fn test_coalesce_sums_duplicates() {
        let coo = CooMatrix::from_triplets(
            2,
            vec![(1, 1, 1.0), (0, 1, 2.0), (1, 1, 3.0), (0, 0, 4.0)],
        )
        .unwrap();
        assert!(!coo.is_coalesced());

        let merged = coo.coalesce();
        assert!(merged.is_coalesced());
        assert_eq!(merged.rows(), &[0, 0, 1]);
        assert_eq!(merged.cols(), &[0, 1, 1]);
        assert_eq!(merged.values(), &[4.0, 2.0, 4.0]);
        assert_eq!(merged.to_dense(), coo.to_dense());
    }

    #[test]
    fn test_new_rejects_bad_triplets() {
        assert!(matches!(
            CooMatrix::new(2, vec![0, 2], vec![0, 1], vec![1.0, 1.0]),
            Err(SolveError::IndexOutOfRange { axis: IndexAxis::Row, .. })
        ));
        assert!(matches!(
            CooMatrix::new(2, vec![0], vec![0, 1], vec![1.0, 1.0]),
            Err(SolveError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_transpose_and_shared_pattern() {
        let coo = CooMatrix::from_triplets(3, vec![(0, 2, 1.0), (1, 0, 2.0)]).unwrap();
        let t = coo.transpose();
        assert_eq!(t.rows(), coo.cols());
        assert_eq!(t.cols(), coo.rows());
        assert_eq!(t.to_dense(), coo.to_dense().transpose());

        let g = coo.with_values(vec![-1.0, -2.0]).unwrap();
        assert!(g.same_pattern(&coo));
        assert!(coo.with_values(vec![0.0]).is_err());
    }

    #[test]
    fn test_matmul_dense() {
        // [[1, 2], [3, 4]] * [1, 2]ᵀ = [5, 11]ᵀ
        let coo = CooMatrix::from_triplets(
            2,
            vec![(0, 0, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 1, 4.0)],
        )
        .unwrap();
        let x = DMatrix::from_column_slice(2, 1, &[1.0, 2.0]);
        let y = coo.matmul_dense(&x).unwrap();
        assert!((y[(0, 0)] - 5.0).abs() < 1e-12);
        assert!((y[(1, 0)] - 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_row_detection() {
        let coo = CooMatrix::from_triplets(3, vec![(0, 0, 1.0), (2, 1, 1.0), (2, 2, 1.0)]).unwrap();
        let csc = coo.to_csc().unwrap();
        assert_eq!(csc.first_empty_column(), None);
        assert_eq!(csc.first_empty_row(), Some(1));
    }
}
