//! Linear algebra layer.
//!
//! Sparse matrix formats, the COO→CSC conversion, factorization backends and
//! the scoped direct solve built on them.

pub mod sparse;
pub mod backend;
pub mod backends;
pub mod direct;
