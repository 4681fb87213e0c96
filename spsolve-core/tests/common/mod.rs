//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use nalgebra::DMatrix;
use spsolve_core::{CooMatrix, DenseBatch, SparseBatch};

/// Deterministic linear congruential generator; uniform in `[0, 1)`.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `[-1, 1)`.
    pub fn signed(&mut self) -> f64 {
        2.0 * self.next_f64() - 1.0
    }

    /// Magnitude in `[0.5, 1.5)` with a random sign, never close to zero.
    pub fn nonzero(&mut self) -> f64 {
        let magnitude = 0.5 + self.next_f64();
        if self.next_f64() < 0.5 {
            -magnitude
        } else {
            magnitude
        }
    }
}

/// Lower-triangular mask `[[1, 0, 0], [1, 1, 0], [0, 0, 1]]` filled with
/// random values, four items, with a `(4, 3, 2)` right-hand side.
pub fn masked_fixture(seed: u64) -> (SparseBatch, DenseBatch) {
    let mut rng = Lcg::new(seed);
    let mask = [(0, 0), (1, 0), (1, 1), (2, 2)];
    let items = (0..4)
        .map(|_| {
            let triplets: Vec<_> = mask.iter().map(|&(i, j)| (i, j, rng.nonzero())).collect();
            CooMatrix::from_triplets(3, triplets).unwrap()
        })
        .collect();
    let a = SparseBatch::new(3, items).unwrap();
    let b = DenseBatch::from_fn(4, 3, 2, |_, _, _| rng.signed());
    (a, b)
}

/// Random diagonally dominant `n × n` matrix with about `density · n²`
/// off-diagonal entries.
pub fn diag_dominant(rng: &mut Lcg, n: usize, density: f64) -> CooMatrix {
    let mut triplets = Vec::new();
    let mut row_sums = vec![0.0; n];
    for i in 0..n {
        for j in 0..n {
            if i != j && rng.next_f64() < density {
                let v = rng.signed();
                row_sums[i] += v.abs();
                triplets.push((i, j, v));
            }
        }
    }
    for (i, sum) in row_sums.iter().enumerate() {
        triplets.push((i, i, sum + 1.0));
    }
    CooMatrix::from_triplets(n, triplets).unwrap()
}

/// Reference solve through a dense LU.
pub fn dense_solve(a: &CooMatrix, b: &DMatrix<f64>) -> DMatrix<f64> {
    a.to_dense().lu().solve(b).unwrap()
}
