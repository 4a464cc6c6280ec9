//! Shared domain types.
//!
//! `FitResult` keeps its arrays as `nalgebra::DVector<f64>` so downstream numeric
//! code can use them directly; the JSON-safe mirror lives in `io::record`.

use std::path::PathBuf;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// Number of time bins in one acquisition histogram.
pub const HISTOGRAM_BINS: usize = 256;

/// A measured decay histogram for one acquisition channel.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayCurve {
    pub channel: u32,
    /// Bin times in nanoseconds.
    pub x_values: Vec<f64>,
    /// Photon counts per bin.
    pub y_values: Vec<f64>,
}

impl DecayCurve {
    pub fn new(channel: u32, x_values: Vec<f64>, y_values: Vec<f64>) -> Self {
        Self {
            channel,
            x_values,
            y_values,
        }
    }

    pub fn total_counts(&self) -> f64 {
        self.y_values.iter().sum()
    }
}

/// One entry of the model bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    OneExp,
    TwoExp,
    ThreeExp,
    FourExp,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::OneExp,
        ModelKind::TwoExp,
        ModelKind::ThreeExp,
        ModelKind::FourExp,
    ];

    /// Number of exponential components.
    pub fn components(self) -> usize {
        match self {
            ModelKind::OneExp => 1,
            ModelKind::TwoExp => 2,
            ModelKind::ThreeExp => 3,
            ModelKind::FourExp => 4,
        }
    }

    /// `(amplitude, tau)` per component plus the background.
    pub fn param_count(self) -> usize {
        2 * self.components() + 1
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::OneExp => "1-exp",
            ModelKind::TwoExp => "2-exp",
            ModelKind::ThreeExp => "3-exp",
            ModelKind::FourExp => "4-exp",
        }
    }

    /// Formula string used verbatim in reports.
    pub fn formula(self) -> &'static str {
        match self {
            ModelKind::OneExp => "A1*exp(-t/tau1) + B",
            ModelKind::TwoExp => "A1*exp(-t/tau1) + A2*exp(-t/tau2) + B",
            ModelKind::ThreeExp => "A1*exp(-t/tau1) + A2*exp(-t/tau2) + A3*exp(-t/tau3) + B",
            ModelKind::FourExp => {
                "A1*exp(-t/tau1) + A2*exp(-t/tau2) + A3*exp(-t/tau3) + A4*exp(-t/tau4) + B"
            }
        }
    }
}

/// Engine tunables. The defaults reproduce the reference behaviour.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Residual evaluation budget per model for the nonlinear solver.
    pub max_evaluations: usize,
    /// Relative tau difference below which components are merged.
    pub collapse_threshold: f64,
    /// Largest component count tried (1..=4).
    pub max_components: usize,
    /// Reject `x`/`y` length mismatches instead of truncating.
    pub strict_lengths: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 20_000,
            collapse_threshold: 0.01,
            max_components: 4,
            strict_lengths: false,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<(), FitError> {
        if self.max_evaluations == 0 {
            return Err(FitError::InvalidOptions(
                "max_evaluations must be > 0".to_string(),
            ));
        }
        if !(self.collapse_threshold.is_finite() && self.collapse_threshold >= 0.0) {
            return Err(FitError::InvalidOptions(format!(
                "collapse_threshold must be finite and >= 0, got {}",
                self.collapse_threshold
            )));
        }
        if !(1..=4).contains(&self.max_components) {
            return Err(FitError::InvalidOptions(format!(
                "max_components must be in 1..=4, got {}",
                self.max_components
            )));
        }
        Ok(())
    }
}

/// Outcome of fitting one curve.
///
/// Created once per fit call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub channel: u32,
    pub model: ModelKind,
    /// Full time axis of the input curve (after length reconciliation).
    pub x_values: DVector<f64>,
    /// `x_values[decay_start..]`.
    pub t_data: DVector<f64>,
    /// Rescaled counts aligned with `t_data`.
    pub y_data: DVector<f64>,
    pub fitted_values: DVector<f64>,
    /// `y_data - fitted_values`.
    pub residuals: DVector<f64>,
    /// Divisor applied to the counts before fitting (1 when max <= 1000).
    pub scale_factor: f64,
    /// Index of the peak bin in the input curve.
    pub decay_start: usize,
    /// `[A1, tau1, ..., Ak, tauk, B]` in rescaled units.
    pub parameters: DVector<f64>,
    /// Reduced chi-square of the final model (lower is better).
    pub goodness_of_fit: f64,
    pub r_squared: f64,
    pub model_description: String,
    /// Multi-line human-readable summary.
    pub report: String,
    /// True when near-identical lifetimes were merged into one component.
    pub collapsed: bool,
}

impl FitResult {
    pub fn amplitudes(&self) -> Vec<f64> {
        (0..self.model.components())
            .map(|i| self.parameters[2 * i])
            .collect()
    }

    pub fn taus(&self) -> Vec<f64> {
        (0..self.model.components())
            .map(|i| self.parameters[2 * i + 1])
            .collect()
    }

    pub fn background(&self) -> f64 {
        self.parameters[self.parameters.len() - 1]
    }

    /// Fitted curve in original count units.
    pub fn fitted_counts(&self) -> DVector<f64> {
        &self.fitted_values * self.scale_factor
    }
}

/// Per-model diagnostics gathered during selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelScore {
    pub model: ModelKind,
    pub parameters: Vec<f64>,
    pub reduced_chi_square: f64,
    pub r_squared: f64,
    pub evaluations: usize,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub input: PathBuf,
    /// Restrict fitting to these channels (empty = all active channels).
    pub channels: Vec<u32>,
    pub options: FitOptions,
    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub export_json: Option<PathBuf>,
    pub export_csv: Option<PathBuf>,
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_count_includes_background() {
        assert_eq!(ModelKind::OneExp.param_count(), 3);
        assert_eq!(ModelKind::FourExp.param_count(), 9);
    }

    #[test]
    fn options_validation_rejects_bad_component_count() {
        let opts = FitOptions {
            max_components: 5,
            ..FitOptions::default()
        };
        assert!(matches!(opts.validate(), Err(FitError::InvalidOptions(_))));
        assert!(FitOptions::default().validate().is_ok());
    }
}
