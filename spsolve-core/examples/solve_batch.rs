//! Solve a small batch and run the backward pass.
//!
//! Run with: cargo run -p spsolve-core --example solve_batch

use nalgebra::DMatrix;
use spsolve_core::{solve, CooMatrix, DenseBatch, SolveResult, SparseBatch};

fn main() -> SolveResult<()> {
    // Two 3×3 lower-triangular systems with the same pattern.
    let pattern = [(0, 0), (1, 0), (1, 1), (2, 2)];
    let items = [[2.0, 1.0, 4.0, 5.0], [1.0, -1.0, 2.0, 0.5]]
        .iter()
        .map(|vals| {
            CooMatrix::from_triplets(
                3,
                pattern.iter().zip(vals.iter()).map(|(&(i, j), &v)| (i, j, v)),
            )
        })
        .collect::<SolveResult<Vec<_>>>()?;
    let a = SparseBatch::new(3, items)?;
    let b = DenseBatch::from_items(vec![
        DMatrix::from_column_slice(3, 1, &[2.0, 5.0, 10.0]),
        DMatrix::from_column_slice(3, 1, &[1.0, 1.0, 1.0]),
    ])?;

    let (x, ctx) = solve(&a, &b)?;
    for (idx, xi) in x.iter().enumerate() {
        println!("x[{}] = {:?}", idx, xi.as_slice());
    }

    let grads = ctx.backward(&DenseBatch::from_fn(2, 3, 1, |_, _, _| 1.0))?;
    for (idx, ga) in grads.grad_a.iter().enumerate() {
        println!("dL/dA[{}] on pattern = {:?}", idx, ga.values());
    }
    for (idx, gb) in grads.grad_b.iter().enumerate() {
        println!("dL/db[{}] = {:?}", idx, gb.as_slice());
    }
    Ok(())
}
