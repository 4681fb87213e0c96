use clap::ValueEnum;
use spsolve_core::{BackendKind, ExecutionStrategy};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendChoice {
    Faer,
    Dense,
    Both,
}

impl BackendChoice {
    pub fn kinds(self) -> Vec<BackendKind> {
        match self {
            BackendChoice::Faer => vec![BackendKind::Faer],
            BackendChoice::Dense => vec![BackendKind::Dense],
            BackendChoice::Both => vec![BackendKind::Faer, BackendKind::Dense],
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyChoice {
    Sequential,
    Parallel,
    Both,
}

impl StrategyChoice {
    /// `threads` sizes the parallel pool; 0 uses the global rayon pool.
    pub fn strategies(self, threads: usize) -> Vec<ExecutionStrategy> {
        let parallel = ExecutionStrategy::Parallel { threads };
        match self {
            StrategyChoice::Sequential => vec![ExecutionStrategy::Sequential],
            StrategyChoice::Parallel => vec![parallel],
            StrategyChoice::Both => vec![ExecutionStrategy::Sequential, parallel],
        }
    }
}
