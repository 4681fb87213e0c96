mod dense_lu;
mod faer_lu;

pub use dense_lu::{DenseLuBackend, DenseSymbolic};
pub use faer_lu::FaerLuBackend;
