//! Utility functions.
//!
//! Environment-variable parsing for settings overrides and small numerical
//! helpers shared by tests and the benchmark driver.

use std::str::FromStr;

use nalgebra::DMatrix;

/// Parse an environment variable, ignoring it when unset or unparsable.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

/// Boolean environment flag: anything but `0`/`false` counts as set.
pub fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|s| s != "0" && s.to_lowercase() != "false")
}

/// Largest absolute elementwise difference; infinite on shape mismatch.
pub fn max_abs_diff(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    if a.shape() != b.shape() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_abs_diff() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let b = DMatrix::from_row_slice(2, 2, &[1.0, 2.5, 3.0, 3.0]);
        assert_eq!(max_abs_diff(&a, &b), 1.0);
        assert!(max_abs_diff(&a, &DMatrix::zeros(2, 1)).is_infinite());
    }

    #[test]
    fn test_env_parse_missing_key() {
        assert_eq!(env_parse::<usize>("SPSOLVE_TEST_UNSET_KEY_XYZ"), None);
        assert_eq!(env_flag("SPSOLVE_TEST_UNSET_KEY_XYZ"), None);
    }
}
