//! Error types.
//!
//! - `FitError`: per-curve failures from the fitting engine. These are values,
//!   not process failures; batch fitting records them per channel.
//! - `SpcError`: acquisition file decoding/encoding.
//! - `RecordError`: JSON record import (shape validation).
//! - `AppError`: what the binary reports, carrying a process exit code.

use thiserror::Error;

/// Failure to fit a single decay curve.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// The curve has no photons at all; nothing was fit.
    #[error("all counts are zero")]
    AllCountsZero,

    /// No model in the bank converged.
    #[error("no model converged")]
    NoConvergence,

    /// `x` and `y` lengths differ and strict length checking is enabled.
    #[error("dimension mismatch: {x_len} x values vs {y_len} y values")]
    DimensionMismatch { x_len: usize, y_len: usize },

    /// Counts must be finite and non-negative.
    #[error("invalid count {value} at bin {index}")]
    InvalidCounts { index: usize, value: f64 },

    /// Too few points after the decay onset for even the simplest model.
    #[error("insufficient data: {points} points after decay onset, need {required}")]
    InsufficientData { points: usize, required: usize },

    #[error("invalid fit options: {0}")]
    InvalidOptions(String),
}

/// Acquisition file errors.
#[derive(Debug, Error)]
pub enum SpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown file magic {0:?}")]
    BadMagic([u8; 4]),

    #[error("file truncated: {0}")]
    Truncated(&'static str),

    #[error("invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("record has {got} histograms, metadata lists {expected} channels")]
    ChannelCount { expected: usize, got: usize },

    #[error("histogram for channel index {index} has {len} bins, expected {expected}")]
    HistogramLength { index: usize, len: usize, expected: usize },
}

/// JSON fit record import errors.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid record JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field `{field}` has length {len}, expected {expected}")]
    Length {
        field: &'static str,
        len: usize,
        expected: usize,
    },

    #[error("decay_start {decay_start} is out of range for {len} x values")]
    DecayStart { decay_start: usize, len: usize },

    #[error("field `{field}` holds a non-finite value at index {index}")]
    NonFinite { field: &'static str, index: usize },
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::InvalidOptions(_) => 2,
            FitError::AllCountsZero
            | FitError::DimensionMismatch { .. }
            | FitError::InvalidCounts { .. }
            | FitError::InsufficientData { .. } => 3,
            FitError::NoConvergence => 4,
        };
        AppError::new(code, format!("Fit failed: {err}"))
    }
}

impl From<SpcError> for AppError {
    fn from(err: SpcError) -> Self {
        AppError::new(2, format!("Acquisition file error: {err}"))
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        AppError::new(2, format!("Fit record error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_errors_map_to_exit_codes() {
        assert_eq!(AppError::from(FitError::AllCountsZero).exit_code(), 3);
        assert_eq!(AppError::from(FitError::NoConvergence).exit_code(), 4);
        assert_eq!(
            AppError::from(FitError::InvalidOptions("x".to_string())).exit_code(),
            2
        );
    }
}
