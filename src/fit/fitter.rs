//! Fitting routine for a single model of the bank.
//!
//! Given the post-onset slice `(t, y)` of a decay curve we:
//! - build a data-driven seed (heuristic guess + tau grid, amplitudes and
//!   background solved linearly for each tau tuple)
//! - refine the best seed with Levenberg–Marquardt
//! - score the converged fit (reduced chi-square, R²)
//!
//! Solver failure is an ordinary outcome (`ModelAttempt::Failed`): the caller
//! simply moves on to the next model.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::{FitOptions, ModelKind, ModelScore};
use crate::fit::lm::refine;
use crate::fit::tau_grid::{grid_steps, tau_grid, MIN_TAU_RATIO};
use crate::math::{r_squared, reduced_chi_square, solve_least_squares};
use crate::models::{fill_design_row, interleave, predict};

/// A converged fit of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFit {
    pub model: ModelKind,
    /// `[A1, tau1, ..., Ak, tauk, B]`, components sorted by ascending tau.
    pub params: Vec<f64>,
    pub fitted: Vec<f64>,
    pub reduced_chi_square: f64,
    pub r_squared: f64,
    pub evaluations: usize,
}

impl ModelFit {
    pub fn taus(&self) -> Vec<f64> {
        (0..self.model.components())
            .map(|c| self.params[2 * c + 1])
            .collect()
    }

    pub fn score(&self) -> ModelScore {
        ModelScore {
            model: self.model,
            parameters: self.params.clone(),
            reduced_chi_square: self.reduced_chi_square,
            r_squared: self.r_squared,
            evaluations: self.evaluations,
        }
    }
}

/// Result of trying one model.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelAttempt {
    Converged(ModelFit),
    Failed { model: ModelKind, reason: String },
}

#[derive(Debug, Clone)]
struct Seed {
    idx: usize,
    params: Vec<f64>,
    sse: f64,
}

/// Fit one model to the post-onset data.
pub fn fit_model(model: ModelKind, t: &[f64], y: &[f64], opts: &FitOptions) -> ModelAttempt {
    let failed = |reason: String| ModelAttempt::Failed { model, reason };

    let n_params = model.param_count();
    if t.len() <= n_params {
        return failed(format!(
            "{} points leave no degrees of freedom for {n_params} parameters",
            t.len()
        ));
    }

    let Some(seed) = seed_params(model, t, y) else {
        return failed("no usable seed from the tau grid".to_string());
    };
    debug!(model = model.display_name(), sse = seed.sse, "seed selected");

    let outcome = match refine(
        model.components(),
        t,
        y,
        &seed.params,
        opts.max_evaluations,
    ) {
        Ok(o) => o,
        Err(reason) => {
            debug!(model = model.display_name(), %reason, "solver did not converge");
            return failed(reason);
        }
    };

    let params = sort_components(&outcome.params);
    let fitted: Vec<f64> = t.iter().map(|&ti| predict(model, ti, &params)).collect();
    if fitted.iter().any(|v| !v.is_finite()) {
        return failed("non-finite model prediction".to_string());
    }

    let Some(chi) = reduced_chi_square(y, &fitted, n_params) else {
        return failed("no degrees of freedom".to_string());
    };
    let r2 = r_squared(y, &fitted);

    debug!(
        model = model.display_name(),
        reduced_chi_square = chi,
        r_squared = r2,
        evaluations = outcome.evaluations,
        "model converged"
    );

    ModelAttempt::Converged(ModelFit {
        model,
        params,
        fitted,
        reduced_chi_square: chi,
        r_squared: r2,
        evaluations: outcome.evaluations,
    })
}

/// Data-driven initial guess for `components` exponentials.
///
/// - background: minimum count
/// - amplitude: `max - min`, split evenly across components
/// - tau: time from the decay start until the data first falls to
///   `background + amplitude/e`, scaled by `(i + 1)` for component `i`
pub fn heuristic_guess(components: usize, t: &[f64], y: &[f64]) -> Vec<f64> {
    let y_max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let y_min = y.iter().copied().fold(f64::INFINITY, f64::min);
    let amplitude = y_max - y_min;
    let threshold = y_min + amplitude / std::f64::consts::E;

    let t0 = t.first().copied().unwrap_or(0.0);
    let span = t.last().copied().unwrap_or(t0) - t0;
    let dt = if t.len() > 1 {
        span / (t.len() as f64 - 1.0)
    } else {
        1.0
    };

    let tau_est = t
        .iter()
        .zip(y)
        .find(|&(_, &yi)| yi <= threshold)
        .map(|(&ti, _)| ti - t0)
        .filter(|v| *v > 0.0)
        .unwrap_or(span / 3.0)
        .max(dt.abs().max(f64::EPSILON));

    let mut out = Vec::with_capacity(2 * components + 1);
    for c in 0..components {
        out.push(amplitude / components as f64);
        out.push(tau_est * (c as f64 + 1.0));
    }
    out.push(y_min);
    out
}

/// Pick the solver seed: the heuristic taus and every grid tuple are scored
/// by their best linear fit; lowest SSE wins, ties by candidate order.
fn seed_params(model: ModelKind, t: &[f64], y: &[f64]) -> Option<Seed> {
    let k = model.components();
    let heuristic = heuristic_guess(k, t, y);
    let heuristic_taus: Vec<f64> = (0..k).map(|c| heuristic[2 * c + 1]).collect();

    let mut candidates = vec![heuristic_taus];
    if let Some((tau_min, tau_max)) = tau_bounds(t) {
        match tau_grid(k, tau_min, tau_max, grid_steps(k), MIN_TAU_RATIO) {
            Ok(grid) => candidates.extend(grid),
            Err(e) => debug!(error = %e, "tau grid unavailable, using heuristic seed only"),
        }
    }

    let seeds: Vec<Seed> = candidates
        .par_iter()
        .enumerate()
        .filter_map(|(idx, taus)| {
            linear_subproblem(taus, t, y).map(|(params, sse)| Seed { idx, params, sse })
        })
        .collect();

    let mut best: Option<&Seed> = None;
    for s in &seeds {
        best = match best {
            Some(b) if s.sse > b.sse || (s.sse == b.sse && s.idx > b.idx) => Some(b),
            _ => Some(s),
        };
    }
    match best {
        Some(b) => Some(b.clone()),
        None => Some(Seed {
            idx: 0,
            params: heuristic,
            sse: f64::INFINITY,
        }),
    }
}

/// Solve amplitudes + background for fixed taus. Returns the interleaved
/// parameter vector and its SSE.
fn linear_subproblem(taus: &[f64], t: &[f64], y: &[f64]) -> Option<(Vec<f64>, f64)> {
    let n = t.len();
    let p = taus.len() + 1;

    let mut x = DMatrix::<f64>::zeros(n, p);
    let mut row = vec![0.0; p];
    for (i, &ti) in t.iter().enumerate() {
        fill_design_row(ti, taus, &mut row);
        for j in 0..p {
            x[(i, j)] = row[j];
        }
    }
    let yv = DVector::from_column_slice(y);

    let beta = solve_least_squares(&x, &yv)?;
    let fitted = &x * &beta;
    let sse: f64 = fitted
        .iter()
        .zip(y)
        .map(|(f, o)| (o - f) * (o - f))
        .sum();

    if sse.is_finite() {
        let linear: Vec<f64> = beta.iter().copied().collect();
        Some((interleave(&linear, taus), sse))
    } else {
        None
    }
}

/// Grid range: half a bin up to twice the observed window.
fn tau_bounds(t: &[f64]) -> Option<(f64, f64)> {
    if t.len() < 2 {
        return None;
    }
    let span = t[t.len() - 1] - t[0];
    if !(span.is_finite() && span > 0.0) {
        return None;
    }
    let dt = span / (t.len() as f64 - 1.0);
    Some((dt / 2.0, 2.0 * span))
}

/// Reorder `(A, tau)` pairs by ascending tau; background stays last.
fn sort_components(params: &[f64]) -> Vec<f64> {
    let k = params.len() / 2;
    let mut pairs: Vec<(f64, f64)> = (0..k).map(|c| (params[2 * c], params[2 * c + 1])).collect();
    pairs.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut out = Vec::with_capacity(params.len());
    for (a, tau) in pairs {
        out.push(a);
        out.push(tau);
    }
    out.push(params[params.len() - 1]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::linspace;

    fn single_exp(t: &[f64]) -> Vec<f64> {
        t.iter().map(|t| 500.0 * (-t / 3.0).exp() + 10.0).collect()
    }

    #[test]
    fn heuristic_guess_tracks_decay_time() {
        let t = linspace(0.0, 25.0, 256);
        let y = single_exp(&t);
        let guess = heuristic_guess(2, &t, &y);

        assert_eq!(guess.len(), 5);
        assert!((guess[4] - y[255]).abs() < 1e-12);
        // 1/e point of a tau=3 decay, within one bin.
        assert!((guess[1] - 3.0).abs() < 0.2, "tau_est={}", guess[1]);
        assert!((guess[3] - 2.0 * guess[1]).abs() < 1e-12);
    }

    #[test]
    fn one_exp_fit_recovers_parameters() {
        let t = linspace(0.0, 25.0, 256);
        let y = single_exp(&t);

        let ModelAttempt::Converged(fit) = fit_model(ModelKind::OneExp, &t, &y, &FitOptions::default())
        else {
            panic!("one-exp fit should converge on noiseless data");
        };
        assert!((fit.params[0] - 500.0).abs() / 500.0 < 1e-6);
        assert!((fit.params[1] - 3.0).abs() / 3.0 < 1e-6);
        assert!((fit.params[2] - 10.0).abs() < 1e-4);
        assert!(fit.r_squared > 0.999_999);
    }

    #[test]
    fn two_exp_fit_separates_distinct_lifetimes() {
        let t = linspace(0.0, 25.0, 256);
        let y: Vec<f64> = t
            .iter()
            .map(|t| 600.0 * (-t / 0.8).exp() + 300.0 * (-t / 5.0).exp() + 4.0)
            .collect();

        let ModelAttempt::Converged(fit) = fit_model(ModelKind::TwoExp, &t, &y, &FitOptions::default())
        else {
            panic!("two-exp fit should converge");
        };
        let taus = fit.taus();
        assert!((taus[0] - 0.8).abs() / 0.8 < 1e-3, "taus={taus:?}");
        assert!((taus[1] - 5.0).abs() / 5.0 < 1e-3, "taus={taus:?}");
    }

    #[test]
    fn too_few_points_is_a_failed_attempt() {
        let t = [0.0, 1.0, 2.0];
        let y = [10.0, 5.0, 2.0];
        let attempt = fit_model(ModelKind::OneExp, &t, &y, &FitOptions::default());
        assert!(matches!(attempt, ModelAttempt::Failed { model: ModelKind::OneExp, .. }));
    }

    #[test]
    fn sort_components_orders_by_tau() {
        let sorted = sort_components(&[1.0, 5.0, 2.0, 0.5, 9.0]);
        assert_eq!(sorted, vec![2.0, 0.5, 1.0, 5.0, 9.0]);
    }
}
