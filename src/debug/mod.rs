//! Debug bundle writer for inspecting every candidate model per channel.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::domain::{DecayCurve, FitConfig};
use crate::error::AppError;
use crate::fit::batch::ChannelFit;
use crate::models::predict;
use crate::report::format_model_diagnostics;

/// Bin stride of the curve grid table.
const GRID_STRIDE: usize = 16;

/// Write a markdown report of a finished batch into `dir`.
pub fn write_debug_bundle(
    dir: &Path,
    curves: &[DecayCurve],
    fits: &[ChannelFit],
    config: &FitConfig,
) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(4, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let stem = config
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let path = dir.join(format!("flimfit_debug_{stem}_{ts}.md"));

    let file = File::create(&path)
        .map_err(|e| AppError::new(4, format!("Failed to create debug file: {e}")))?;
    let mut w = BufWriter::new(file);
    let werr = |e: std::io::Error| AppError::new(4, format!("Failed to write debug: {e}"));

    let opts = &config.options;
    writeln!(w, "# flimfit debug bundle").map_err(werr)?;
    writeln!(w, "- generated: {}", Local::now().to_rfc3339()).map_err(werr)?;
    writeln!(w, "- input: {}", config.input.display()).map_err(werr)?;
    writeln!(
        w,
        "- options: max_evaluations={}, collapse_threshold={}, max_components={}, strict_lengths={}",
        opts.max_evaluations, opts.collapse_threshold, opts.max_components, opts.strict_lengths
    )
    .map_err(werr)?;

    for channel_fit in fits {
        writeln!(w, "\n## Channel {}", channel_fit.channel).map_err(werr)?;
        if let Some(curve) = curves.iter().find(|c| c.channel == channel_fit.channel) {
            writeln!(
                w,
                "Total counts: {:.0} over {} bins",
                curve.total_counts(),
                curve.y_values.len()
            )
            .map_err(werr)?;
        }

        let best = match &channel_fit.outcome {
            Ok(best) => best,
            Err(e) => {
                writeln!(w, "Not fit: {e}").map_err(werr)?;
                continue;
            }
        };
        writeln!(
            w,
            "Decay start: bin {} (t={:.4} ns), scale_factor={}",
            best.decay_start,
            best.t_data.iter().next().copied().unwrap_or(f64::NAN),
            best.scale_factor
        )
        .map_err(werr)?;

        writeln!(w, "\n### Fits").map_err(werr)?;
        writeln!(w, "| model | reduced_chi2 | r2 | evals | params |").map_err(werr)?;
        writeln!(w, "| - | - | - | - | - |").map_err(werr)?;
        for s in &channel_fit.scores {
            writeln!(
                w,
                "| {} | {:.6} | {:.6} | {} | {} |",
                s.model.display_name(),
                s.reduced_chi_square,
                s.r_squared,
                s.evaluations,
                fmt_vec(&s.parameters)
            )
            .map_err(werr)?;
        }
        writeln!(
            w,
            "\n```text\n{}```",
            format_model_diagnostics(best, &channel_fit.scores, &channel_fit.skipped)
        )
        .map_err(werr)?;

        writeln!(w, "\n### Curve grid (rescaled counts)").map_err(werr)?;
        let header: Vec<&str> = channel_fit.scores.iter().map(|s| s.model.display_name()).collect();
        writeln!(w, "| t | observed | {} |", header.join(" | ")).map_err(werr)?;
        writeln!(w, "|{}", " - |".repeat(header.len() + 2)).map_err(werr)?;

        for i in (0..best.t_data.len()).step_by(GRID_STRIDE) {
            let t = best.t_data[i];
            let preds: Vec<String> = channel_fit
                .scores
                .iter()
                .map(|s| fmt_opt(Some(predict(s.model, t, &s.parameters))))
                .collect();
            writeln!(
                w,
                "| {:.3} | {} | {} |",
                t,
                fmt_opt(Some(best.y_data[i])),
                preds.join(" | ")
            )
            .map_err(werr)?;
        }
    }

    w.flush().map_err(werr)?;
    Ok(path)
}

fn fmt_vec(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.3}"),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::SyntheticDecay;
    use crate::domain::FitOptions;
    use crate::fit::batch::fit_batch;
    use tempfile::tempdir;

    #[test]
    fn bundle_lists_every_channel() {
        let curves = vec![
            SyntheticDecay::default().curve(0).unwrap(),
            DecayCurve::new(1, vec![0.0, 1.0], vec![0.0, 0.0]),
        ];
        let config = FitConfig {
            input: PathBuf::from("acq.bin"),
            channels: vec![],
            options: FitOptions::default(),
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export_json: None,
            export_csv: None,
            debug: true,
        };

        let dir = tempdir().unwrap();
        let fits = fit_batch(&curves, &config.options);
        let path = write_debug_bundle(dir.path(), &curves, &fits, &config).unwrap();
        let text = std::fs::read_to_string(path).unwrap();

        assert!(text.starts_with("# flimfit debug bundle"));
        assert!(text.contains("## Channel 0"));
        assert!(text.contains("| 1-exp | "));
        assert!(text.contains("* 1-exp "));
        assert!(text.contains("## Channel 1"));
        assert!(text.contains("Not fit: all counts are zero"));
    }

    #[test]
    fn bundle_reports_the_batch_scores_without_refitting() {
        let curves = vec![SyntheticDecay::default().curve(2).unwrap()];
        let config = FitConfig {
            input: PathBuf::from("acq.bin"),
            channels: vec![],
            options: FitOptions::default(),
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export_json: None,
            export_csv: None,
            debug: true,
        };
        let mut fits = fit_batch(&curves, &config.options);
        fits[0].scores[0].evaluations = 987_654;

        let dir = tempdir().unwrap();
        let path = write_debug_bundle(dir.path(), &curves, &fits, &config).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains(" | 987654 | "), "{text}");
        assert!(text.contains("evals=987654"));
    }
}
