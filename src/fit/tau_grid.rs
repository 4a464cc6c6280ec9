//! Tau grid generation for the solver seed search.
//!
//! Before running the nonlinear solver we scan a deterministic grid of lifetime
//! tuples and keep the one whose linear subproblem (amplitudes + background)
//! has the lowest SSE. This keeps the solver away from poor local minima and
//! is deterministic given the same inputs.

use crate::error::FitError;

/// Grid resolution per component count. Higher orders use coarser grids so the
/// number of tuples stays in the hundreds.
pub fn grid_steps(components: usize) -> usize {
    match components {
        1 => 64,
        2 => 24,
        3 => 12,
        _ => 8,
    }
}

/// Minimum ratio between consecutive taus of one tuple.
pub const MIN_TAU_RATIO: f64 = 1.5;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, FitError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(FitError::InvalidOptions(format!(
            "invalid tau range: min={min}, max={max} (must be finite, >0, and max>min)"
        )));
    }
    if steps < 2 {
        return Err(FitError::InvalidOptions("tau steps must be >= 2".to_string()));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// Ascending tau tuples of length `components`, each consecutive pair at least
/// `min_ratio` apart.
pub fn tau_grid(
    components: usize,
    min: f64,
    max: f64,
    steps: usize,
    min_ratio: f64,
) -> Result<Vec<Vec<f64>>, FitError> {
    if components == 0 {
        return Err(FitError::InvalidOptions(
            "tau grid needs at least one component".to_string(),
        ));
    }
    let values = log_space(min, max, steps)?;
    let min_ratio = min_ratio.max(1.0);

    let mut out = Vec::new();
    let mut current = Vec::with_capacity(components);
    extend_tuples(&values, 0, components, min_ratio, &mut current, &mut out);
    Ok(out)
}

fn extend_tuples(
    values: &[f64],
    start: usize,
    remaining: usize,
    min_ratio: f64,
    current: &mut Vec<f64>,
    out: &mut Vec<Vec<f64>>,
) {
    if remaining == 0 {
        out.push(current.clone());
        return;
    }
    for i in start..values.len() {
        if let Some(&last) = current.last() {
            if values[i] < last * min_ratio {
                continue;
            }
        }
        current.push(values[i]);
        extend_tuples(values, i + 1, remaining - 1, min_ratio, current, out);
        current.pop();
    }
}
