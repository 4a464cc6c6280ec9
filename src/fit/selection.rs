//! Curve fitting entry points and model selection.
//!
//! For one decay curve:
//! 1. reconcile `x`/`y` lengths, validate counts, reject all-zero curves
//! 2. locate the decay onset (peak bin) and drop the rising edge
//! 3. rescale counts above 1000 for solver conditioning
//! 4. fit every model of the bank, skipping failures
//! 5. select the lowest reduced chi-square
//! 6. collapse near-identical lifetimes, then assemble the `FitResult`
//!
//! Selection rules:
//! 1. Exclude underdetermined models: require `n >= k + MIN_N_BUFFER`
//! 2. Find the minimum reduced chi-square among converged models
//! 3. Scores equal to the minimum up to `TIE_REL * best + TIE_ABS` tie; the
//!    simplest of the tied models wins

use nalgebra::DVector;
use tracing::{debug, warn};

use crate::domain::{DecayCurve, FitOptions, FitResult, ModelKind, ModelScore};
use crate::error::FitError;
use crate::fit::collapse::collapse_similar_components;
use crate::fit::fitter::{fit_model, ModelAttempt, ModelFit};
use crate::math::argmax;
use crate::models::MODEL_BANK;
use crate::report::format_fit_report;

/// Counts above this peak value are rescaled before fitting.
pub const RESCALE_THRESHOLD: f64 = 1000.0;

/// Minimum number of extra observations beyond parameter count.
const MIN_N_BUFFER: usize = 2;

/// Relative score tolerance treated as a tie (floating-point noise).
const TIE_REL: f64 = 1e-12;

/// Absolute tie tolerance, so that round-off scores on exact data tie.
const TIE_ABS: f64 = 1e-20;

/// Output of fitting + selection.
#[derive(Debug, Clone)]
pub struct FitSelection {
    pub best: FitResult,
    /// Scores for every converged model, in bank order.
    pub scores: Vec<ModelScore>,
    /// Models that were skipped or failed, and why (for diagnostics).
    pub skipped: Vec<(ModelKind, String)>,
}

/// The post-onset, rescaled view of a curve that every model is fit against.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCurve {
    pub channel: u32,
    pub x_values: Vec<f64>,
    pub t_data: Vec<f64>,
    pub y_data: Vec<f64>,
    pub scale_factor: f64,
    pub decay_start: usize,
}

/// Fit a curve with default options and return the selected result.
pub fn fit(x_values: &[f64], y_values: &[f64], channel: u32) -> Result<FitResult, FitError> {
    let curve = DecayCurve::new(channel, x_values.to_vec(), y_values.to_vec());
    fit_curve(&curve, &FitOptions::default()).map(|selection| selection.best)
}

/// Fit every model of the bank to `curve` and select the best.
pub fn fit_curve(curve: &DecayCurve, opts: &FitOptions) -> Result<FitSelection, FitError> {
    opts.validate()?;
    let prepared = prepare_curve(curve, opts)?;
    let n = prepared.t_data.len();

    let mut fits: Vec<ModelFit> = Vec::new();
    let mut skipped = Vec::new();
    let mut attempted = 0usize;

    for descriptor in MODEL_BANK.iter().take(opts.max_components) {
        let kind = descriptor.kind;
        let k = descriptor.arity;
        if n < k + MIN_N_BUFFER {
            skipped.push((
                kind,
                format!("Underdetermined: n={n} < k+{MIN_N_BUFFER}={}", k + MIN_N_BUFFER),
            ));
            continue;
        }

        attempted += 1;
        match fit_model(kind, &prepared.t_data, &prepared.y_data, opts) {
            ModelAttempt::Converged(fit) => fits.push(fit),
            ModelAttempt::Failed { model, reason } => skipped.push((model, reason)),
        }
    }

    if attempted == 0 {
        return Err(FitError::InsufficientData {
            points: n,
            required: ModelKind::OneExp.param_count() + MIN_N_BUFFER,
        });
    }
    if fits.is_empty() {
        return Err(FitError::NoConvergence);
    }

    let scores: Vec<ModelScore> = fits.iter().map(ModelFit::score).collect();
    let selected = select_best(&fits).clone();
    debug!(
        channel = curve.channel,
        model = selected.model.display_name(),
        reduced_chi_square = selected.reduced_chi_square,
        "model selected"
    );

    let (final_fit, collapsed) =
        collapse_similar_components(selected, &prepared.t_data, &prepared.y_data, opts);

    Ok(FitSelection {
        best: build_result(&prepared, final_fit, collapsed),
        scores,
        skipped,
    })
}

/// Validate and reduce a curve to the slice that gets fit.
pub fn prepare_curve(curve: &DecayCurve, opts: &FitOptions) -> Result<PreparedCurve, FitError> {
    let (x_len, y_len) = (curve.x_values.len(), curve.y_values.len());
    if x_len != y_len {
        if opts.strict_lengths {
            return Err(FitError::DimensionMismatch { x_len, y_len });
        }
        warn!(
            channel = curve.channel,
            x_len, y_len, "x/y length mismatch; truncating to the shorter"
        );
    }
    let len = x_len.min(y_len);
    let x_values = curve.x_values[..len].to_vec();
    let y_values = &curve.y_values[..len];

    if let Some((index, &value)) = y_values
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(FitError::InvalidCounts { index, value });
    }

    let total: f64 = y_values.iter().sum();
    if total == 0.0 {
        return Err(FitError::AllCountsZero);
    }

    // Non-empty here: an empty curve sums to zero.
    let decay_start = argmax(y_values).unwrap_or(0);
    let y_max = y_values[decay_start];

    let scale_factor = if y_max > RESCALE_THRESHOLD {
        y_max / RESCALE_THRESHOLD
    } else {
        1.0
    };

    let t_data = x_values[decay_start..].to_vec();
    let y_data: Vec<f64> = y_values[decay_start..]
        .iter()
        .map(|v| v / scale_factor)
        .collect();

    Ok(PreparedCurve {
        channel: curve.channel,
        x_values,
        t_data,
        y_data,
        scale_factor,
        decay_start,
    })
}

fn select_best(fits: &[ModelFit]) -> &ModelFit {
    let mut best = &fits[0];
    for f in &fits[1..] {
        if f.reduced_chi_square < best.reduced_chi_square {
            best = f;
        }
    }

    let cutoff = best.reduced_chi_square * (1.0 + TIE_REL) + TIE_ABS;

    // `fits` is in bank order, i.e. increasing complexity.
    fits.iter()
        .find(|f| f.reduced_chi_square <= cutoff)
        .unwrap_or(best)
}

fn build_result(prepared: &PreparedCurve, fit: ModelFit, collapsed: bool) -> FitResult {
    let y_data = DVector::from_column_slice(&prepared.y_data);
    let fitted_values = DVector::from_vec(fit.fitted);
    let residuals = &y_data - &fitted_values;

    let mut result = FitResult {
        channel: prepared.channel,
        model: fit.model,
        x_values: DVector::from_column_slice(&prepared.x_values),
        t_data: DVector::from_column_slice(&prepared.t_data),
        y_data,
        fitted_values,
        residuals,
        scale_factor: prepared.scale_factor,
        decay_start: prepared.decay_start,
        parameters: DVector::from_vec(fit.params),
        goodness_of_fit: fit.reduced_chi_square,
        r_squared: fit.r_squared,
        model_description: fit.model.formula().to_string(),
        report: String::new(),
        collapsed,
    };
    result.report = format_fit_report(&result);
    result
}
