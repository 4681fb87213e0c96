//! Benchmarking CLI for spsolve.
//!
//! Generates random diagonally dominant sparse batches and times the forward
//! and backward passes for each backend and execution strategy.

mod backend_choice;

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use backend_choice::{BackendChoice, StrategyChoice};
use spsolve_core::{
    grad, residual_norm, BackendKind, BatchSolver, CooMatrix, DenseBatch, ExecutionStrategy,
    SolveSettings, SparseBatch,
};

#[derive(Parser, Debug)]
#[command(name = "spsolve-bench", about = "Time batched sparse solves and their gradients")]
struct Args {
    /// Matrix order
    #[arg(short = 'n', long, default_value_t = 200)]
    order: usize,

    /// Number of batch items
    #[arg(short, long, default_value_t = 16)]
    batch: usize,

    /// Right-hand-side columns per item
    #[arg(short = 'k', long, default_value_t = 4)]
    rhs: usize,

    /// Probability of an off-diagonal entry
    #[arg(short, long, default_value_t = 0.02)]
    density: f64,

    /// Factorization backend(s) to time
    #[arg(long, value_enum, default_value_t = BackendChoice::Faer)]
    backend: BackendChoice,

    /// Execution strategy or strategies to time
    #[arg(long, value_enum, default_value_t = StrategyChoice::Both)]
    strategy: StrategyChoice,

    /// Worker threads for the parallel strategy (0 = rayon global pool)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,

    /// Repetitions per configuration; the best time is reported
    #[arg(short, long, default_value_t = 3)]
    repeat: usize,

    /// Random seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,
}

/// Simple LCG, uniform in `[0, 1)`.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((self.0 >> 33) as f64) / (u32::MAX as f64)
    }
}

/// Random batch of diagonally dominant matrices with a random right-hand side.
fn generate_batch(args: &Args) -> Result<(SparseBatch, DenseBatch)> {
    let mut rng = Lcg(args.seed);
    let n = args.order;

    let mut items = Vec::with_capacity(args.batch);
    for _ in 0..args.batch {
        let mut triplets = Vec::new();
        let mut row_sums = vec![0.0; n];
        for i in 0..n {
            for j in 0..n {
                if i != j && rng.next_f64() < args.density {
                    let val = 2.0 * rng.next_f64() - 1.0;
                    row_sums[i] += val.abs();
                    triplets.push((i, j, val));
                }
            }
        }
        // Strict diagonal dominance keeps every item nonsingular
        for (i, sum) in row_sums.iter().enumerate() {
            triplets.push((i, i, sum + 1.0));
        }
        items.push(CooMatrix::from_triplets(n, triplets).context("building batch item")?);
    }

    let a = SparseBatch::new(n, items)?;
    let b = DenseBatch::from_fn(args.batch, n, args.rhs, |_, _, _| 2.0 * rng.next_f64() - 1.0);
    Ok((a, b))
}

fn run_benchmark(
    a: &SparseBatch,
    b: &DenseBatch,
    backend: BackendKind,
    strategy: ExecutionStrategy,
    repeat: usize,
) -> Result<()> {
    let solver = BatchSolver::new(SolveSettings {
        strategy,
        backend,
        verbose: false,
    });
    let label = format!("{} / {:?}", backend, strategy);

    let mut best_forward = f64::INFINITY;
    let mut best_backward = f64::INFINITY;
    let mut x = None;
    for _ in 0..repeat.max(1) {
        let start = Instant::now();
        let sol = solver.solve(a, b).with_context(|| format!("forward solve ({})", label))?;
        best_forward = best_forward.min(start.elapsed().as_secs_f64());

        let start = Instant::now();
        grad::backward(&solver, b, a, b, &sol).with_context(|| format!("backward pass ({})", label))?;
        best_backward = best_backward.min(start.elapsed().as_secs_f64());

        x = Some(sol);
    }

    let x = x.context("no repetitions ran")?;
    let residual = residual_norm(a, &x, b)?.into_iter().fold(0.0, f64::max);

    println!("{:<40} {:>12.3} {:>12.3} {:>12.2e}", label, best_forward * 1000.0, best_backward * 1000.0, residual);
    info!("{}: forward {:.6}s backward {:.6}s", label, best_forward, best_backward);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("spsolve Benchmarks");
    println!("==================\n");

    let (a, b) = generate_batch(&args)?;
    let nnz: usize = a.iter().map(CooMatrix::nnz).sum();
    let n = args.order;
    println!("Batch:            {}", args.batch);
    println!("Order (n):        {}", n);
    println!("RHS columns (k):  {}", args.rhs);
    println!(
        "Nonzeros/item:    {} ({:.2}% dense)",
        nnz / args.batch.max(1),
        100.0 * nnz as f64 / (args.batch.max(1) * n * n).max(1) as f64
    );
    println!();

    println!("{:<40} {:>12} {:>12} {:>12}", "configuration", "forward ms", "backward ms", "residual");
    println!("{}", "-".repeat(80));
    for backend in args.backend.kinds() {
        for strategy in args.strategy.strategies(args.threads) {
            run_benchmark(&a, &b, backend, strategy, args.repeat)?;
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("Benchmarks complete");
    Ok(())
}
