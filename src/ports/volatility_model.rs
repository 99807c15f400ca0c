//! Conditional volatility model port
//!
//! The regime logic only needs "returns in, one-step conditional
//! volatility out". Any estimator (native, FFI, precomputed) plugs in here.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("insufficient data: requires {required} returns, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("optimizer did not converge after {iterations} iterations")]
    NonConvergence { iterations: usize },

    #[error("invalid model output: {0}")]
    InvalidOutput(String),
}

/// Conditional volatility estimator
pub trait VolatilityModel: Send + Sync {
    /// Fit on `returns` and return a same-length series of one-step
    /// conditional volatility estimates (same units as `returns`).
    fn fit(&self, returns: &[f64]) -> Result<Vec<f64>, FitError>;

    /// Model name for logging
    fn name(&self) -> &'static str;
}
