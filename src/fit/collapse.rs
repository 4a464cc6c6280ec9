//! Component collapse.
//!
//! A multi-exponential fit whose lifetimes are all within a small relative
//! distance of each other carries no real multi-exponential structure; it is
//! replaced by a fresh single-exponential fit of the same data.

use tracing::{info, warn};

use crate::domain::{FitOptions, ModelKind};
use crate::fit::fitter::{fit_model, ModelAttempt, ModelFit};

/// True when every pair `i < j` satisfies `|tau_i - tau_j| / tau_i < threshold`.
///
/// Fewer than two lifetimes never count as similar.
pub fn lifetimes_similar(taus: &[f64], threshold: f64) -> bool {
    if taus.len() < 2 {
        return false;
    }
    for i in 0..taus.len() {
        for j in (i + 1)..taus.len() {
            let rel = (taus[i] - taus[j]).abs() / taus[i];
            if !(rel < threshold) {
                return false;
            }
        }
    }
    true
}

/// Apply the collapse rule to a selected fit.
///
/// Returns the (possibly replaced) fit and whether a collapse happened. If the
/// single-exponential refit fails, the original fit is kept.
pub fn collapse_similar_components(
    fit: ModelFit,
    t: &[f64],
    y: &[f64],
    opts: &FitOptions,
) -> (ModelFit, bool) {
    let taus = fit.taus();
    if !lifetimes_similar(&taus, opts.collapse_threshold) {
        return (fit, false);
    }

    match fit_model(ModelKind::OneExp, t, y, opts) {
        ModelAttempt::Converged(single) => {
            info!(
                from = fit.model.display_name(),
                ?taus,
                tau = single.params[1],
                "collapsed near-identical lifetimes"
            );
            (single, true)
        }
        ModelAttempt::Failed { reason, .. } => {
            warn!(%reason, "single-exponential refit failed; keeping {}", fit.model.display_name());
            (fit, false)
        }
    }
}
