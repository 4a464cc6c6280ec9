//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (golden tests below)

use std::path::Path;

use crate::domain::{FitResult, ModelKind, ModelScore};
use crate::fit::batch::ChannelFit;
use crate::fit::selection::FitSelection;
use crate::math::Phasor;
use crate::report::component_shares;

/// The per-fit text report: one line per lifetime, then background, scores
/// and the model formula.
pub fn format_fit_report(fit: &FitResult) -> String {
    let shares = component_shares(fit);
    let mut lines = Vec::with_capacity(shares.components.len() + 4);

    for (i, c) in shares.components.iter().enumerate() {
        lines.push(format!(
            "τ{} = {:.4} ns, {} of total",
            i + 1,
            c.tau,
            fmt_pct(c.fraction)
        ));
    }
    lines.push(format!(
        "Background: {} of total",
        fmt_pct(shares.background_fraction)
    ));
    lines.push(format!("Reduced χ²: {:.6}", fit.goodness_of_fit));
    lines.push(format!("R²: {:.6}", fit.r_squared));
    lines.push(format!("Model: {}", fit.model_description));

    lines.join("\n")
}

/// Every candidate model's score; the selected model is starred.
pub fn format_selection_diagnostics(selection: &FitSelection) -> String {
    format_model_diagnostics(&selection.best, &selection.scores, &selection.skipped)
}

/// Diagnostics from the parts a batch keeps per channel.
pub fn format_model_diagnostics(
    best: &FitResult,
    scores: &[ModelScore],
    skipped: &[(ModelKind, String)],
) -> String {
    let mut out = String::from("Model diagnostics:\n");

    for score in scores {
        let chosen = if score.model == best.model { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<6} χ²r={:.6} R²={:.6} evals={}\n",
            score.model.display_name(),
            score.reduced_chi_square,
            score.r_squared,
            score.evaluations
        ));
    }
    for (kind, reason) in skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
    }
    if best.collapsed {
        out.push_str("  near-identical lifetimes collapsed to 1-exp\n");
    }
    out
}

/// Header plus one block per channel; failed channels show their error.
pub fn format_batch_summary(source: &Path, fits: &[ChannelFit]) -> String {
    let ok = fits.iter().filter(|f| f.outcome.is_ok()).count();

    let mut out = String::new();
    out.push_str("=== flimfit - decay fit ===\n");
    out.push_str(&format!("Source: {}\n", source.display()));
    out.push_str(&format!("Channels: {} fitted, {} failed\n", ok, fits.len() - ok));

    for f in fits {
        out.push('\n');
        match &f.outcome {
            Ok(fit) => {
                out.push_str(&format!(
                    "Channel {} ({}, peak bin {}):\n",
                    f.channel,
                    fit.model.display_name(),
                    fit.decay_start
                ));
                out.push_str(&indent(&fit.report));
                out.push('\n');
            }
            Err(e) => out.push_str(&format!("Channel {}: error: {e}\n", f.channel)),
        }
    }
    out
}

/// G/S table with the phase lifetime per channel.
pub fn format_phasor_table(rows: &[(u32, Option<Phasor>)], period_ns: f64, harmonic: u32) -> String {
    let mut out = String::new();
    out.push_str(&format!("Phasor (harmonic {harmonic}, period {period_ns} ns):\n"));
    out.push_str(&format!("{:<8} {:>10} {:>10} {:>12}\n", "channel", "G", "S", "tau_phi[ns]"));
    out.push_str(&format!("{:-<8} {:-<10} {:-<10} {:-<12}\n", "", "", "", ""));
    for (channel, p) in rows {
        match p {
            Some(p) => {
                let tau = p
                    .phase_lifetime(period_ns, harmonic)
                    .map(|v| format!("{v:.4}"))
                    .unwrap_or_else(|| "-".to_string());
                out.push_str(&format!("{channel:<8} {:>10.6} {:>10.6} {tau:>12}\n", p.g, p.s));
            }
            None => out.push_str(&format!("{channel:<8} {:>10} {:>10} {:>12}\n", "-", "-", "-")),
        }
    }
    out
}

fn fmt_pct(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("  {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitError;
    use nalgebra::DVector;

    fn fit_with(model: ModelKind, params: Vec<f64>) -> FitResult {
        FitResult {
            channel: 0,
            model,
            x_values: DVector::zeros(4),
            t_data: DVector::zeros(4),
            y_data: DVector::zeros(4),
            fitted_values: DVector::zeros(4),
            residuals: DVector::zeros(4),
            scale_factor: 1.0,
            decay_start: 0,
            parameters: DVector::from_vec(params),
            goodness_of_fit: 1.25,
            r_squared: 0.9987,
            model_description: model.formula().to_string(),
            report: String::new(),
            collapsed: false,
        }
    }

    #[test]
    fn fit_report_golden() {
        let fit = fit_with(ModelKind::TwoExp, vec![300.0, 0.8, 100.0, 4.0, 100.0]);
        let expected = "\
τ1 = 0.8000 ns, 60.00% of total
τ2 = 4.0000 ns, 20.00% of total
Background: 20.00% of total
Reduced χ²: 1.250000
R²: 0.998700
Model: A1*exp(-t/tau1) + A2*exp(-t/tau2) + B";
        assert_eq!(format_fit_report(&fit), expected);
    }

    #[test]
    fn diagnostics_star_the_selected_model() {
        let best = fit_with(ModelKind::OneExp, vec![10.0, 3.0, 1.0]);
        let score = |model, chi| ModelScore {
            model,
            parameters: vec![],
            reduced_chi_square: chi,
            r_squared: 0.99,
            evaluations: 12,
        };
        let selection = FitSelection {
            best,
            scores: vec![score(ModelKind::OneExp, 1.0), score(ModelKind::TwoExp, 0.98)],
            skipped: vec![(ModelKind::ThreeExp, "no convergence".to_string())],
        };

        let text = format_selection_diagnostics(&selection);
        assert!(text.contains("* 1-exp "));
        assert!(text.contains("  2-exp "));
        assert!(text.contains("(skipped 3-exp) no convergence"));
    }

    #[test]
    fn batch_summary_lists_failures() {
        let mut fit = fit_with(ModelKind::OneExp, vec![10.0, 3.0, 1.0]);
        fit.channel = 1;
        fit.report = format_fit_report(&fit);
        let fits = vec![
            ChannelFit {
                channel: 1,
                outcome: Ok(fit),
                scores: vec![],
                skipped: vec![],
            },
            ChannelFit {
                channel: 2,
                outcome: Err(FitError::AllCountsZero),
                scores: vec![],
                skipped: vec![],
            },
        ];

        let text = format_batch_summary(Path::new("run.bin"), &fits);
        assert!(text.contains("Channels: 1 fitted, 1 failed"));
        assert!(text.contains("Channel 1 (1-exp, peak bin 0):\n  τ1 = 3.0000 ns"));
        assert!(text.contains("Channel 2: error: all counts are zero"));
    }

    #[test]
    fn phasor_table_shows_phase_lifetime() {
        let rows = vec![(0, Some(Phasor { g: 0.5, s: 0.5 })), (3, None)];
        let text = format_phasor_table(&rows, 12.5, 1);
        // tan(phi) = 1, omega = 2π/12.5 => tau_phi = 12.5/(2π)
        assert!(text.contains("0          0.500000   0.500000       1.9894\n"), "{text}");
        assert!(text.contains("3                 -          -            -\n"), "{text}");
    }
}
