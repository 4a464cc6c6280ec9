//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - reads acquisition files
//! - runs per-channel fitting + model selection
//! - prints reports/plots
//! - writes optional exports

use std::path::Path;

use clap::Parser;

use crate::cli::{Command, FitArgs, PhasorArgs, ShowArgs, SynthArgs};
use crate::data::sample::{synthetic_file, SyntheticDecay};
use crate::domain::{FitConfig, FitOptions};
use crate::error::AppError;
use crate::plot::YScale;

pub mod pipeline;

/// Entry point for the `flimfit` binary.
pub fn run() -> Result<(), AppError> {
    // We want `flimfit` and `flimfit -f run.bin` to behave like `flimfit fit ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Show(args) => handle_show(args),
        Command::Synth(args) => handle_synth(args),
        Command::Phasor(args) => handle_phasor(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_batch_summary(&config.input, &run.fits)
    );

    if config.plot {
        let scale = plot_scale(args.log);
        for fit in run.fits.iter().filter_map(|f| f.outcome.as_ref().ok()) {
            println!(
                "{}",
                crate::plot::render_decay_plot(fit, config.plot_width, config.plot_height, scale)
            );
        }
    }

    // Optional exports.
    if let Some(path) = &config.export_json {
        let batch = crate::io::results::FitBatchFile::from_fits(&config.input, &run.fits);
        crate::io::results::write_batch_json(path, &batch)?;
    }
    if let Some(dir) = &config.export_csv {
        let fits = run.fits.iter().filter_map(|f| f.outcome.as_ref().ok());
        crate::io::export::write_fits_csv_dir(dir, fits)?;
    }
    if config.debug {
        let path = crate::debug::write_debug_bundle(Path::new("debug"), &run.curves, &run.fits, &config)?;
        println!("Debug bundle: {}", path.display());
    }

    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let batch = crate::io::results::read_batch_json(&args.results)?;

    println!("=== flimfit - saved results ===");
    println!("Source: {}", batch.source);
    println!("Generated: {} by {}", batch.generated_at.to_rfc3339(), batch.tool);

    for record in batch.channels {
        let channel = record.channel;
        let error = record.error.clone();
        println!();
        match record.into_fit()? {
            Some(fit) => {
                println!("Channel {channel} ({}):", fit.model.display_name());
                for line in fit.report.lines() {
                    println!("  {line}");
                }
                if args.plot {
                    println!(
                        "{}",
                        crate::plot::render_decay_plot(&fit, args.width, args.height, plot_scale(args.log))
                    );
                }
            }
            None => println!(
                "Channel {channel}: error: {}",
                error.as_deref().unwrap_or("no fit recorded")
            ),
        }
    }
    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    if args.taus.len() != args.amplitudes.len() {
        return Err(AppError::new(
            2,
            format!(
                "Got {} --tau value(s) but {} --amplitude value(s).",
                args.taus.len(),
                args.amplitudes.len()
            ),
        ));
    }
    if args.channels.is_empty() {
        return Err(AppError::new(2, "At least one channel is required."));
    }

    let spec = SyntheticDecay {
        components: args.amplitudes.iter().copied().zip(args.taus.iter().copied()).collect(),
        background: args.background,
        period_ns: args.period,
        rise_bins: args.rise_bins,
        noise: !args.no_noise,
        seed: args.seed,
        ..SyntheticDecay::default()
    };
    let file = synthetic_file(&spec, &args.channels, args.records)?;
    crate::io::spc::write_spc(&args.output, &file)?;

    println!(
        "Wrote {} record(s) x {} channel(s) to {}",
        file.records.len(),
        file.metadata.channels.len(),
        args.output.display()
    );
    Ok(())
}

fn handle_phasor(args: PhasorArgs) -> Result<(), AppError> {
    let (period, rows) = pipeline::run_phasor(&args.input, args.harmonic)?;
    println!("{}", crate::report::format_phasor_table(&rows, period, args.harmonic));
    Ok(())
}

fn plot_scale(log: bool) -> YScale {
    if log { YScale::Log } else { YScale::Linear }
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        input: args.input.clone(),
        channels: args.channels.clone(),
        options: FitOptions {
            max_evaluations: args.max_evaluations,
            collapse_threshold: args.collapse_threshold,
            max_components: args.model_max,
            strict_lengths: args.strict,
        },
        plot: args.plot,
        plot_width: args.width,
        plot_height: args.height,
        export_json: args.export_json.clone(),
        export_csv: args.export_csv.clone(),
        debug: args.debug,
    }
}

/// Rewrite argv so `flimfit` defaults to `flimfit fit`.
///
/// Rules:
/// - `flimfit`                      -> `flimfit fit`
/// - `flimfit -f run.bin ...`       -> `flimfit fit -f run.bin ...`
/// - `flimfit --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fit" | "show" | "synth" | "phasor");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "fit flags".
    if arg1.starts_with('-') {
        argv.insert(1, "fit".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_defaults_to_fit() {
        assert_eq!(rewrite_args(argv(&["flimfit"])), argv(&["flimfit", "fit"]));
        assert_eq!(
            rewrite_args(argv(&["flimfit", "-f", "a.bin"])),
            argv(&["flimfit", "fit", "-f", "a.bin"])
        );
        assert_eq!(
            rewrite_args(argv(&["flimfit", "show", "--results", "r.json"])),
            argv(&["flimfit", "show", "--results", "r.json"])
        );
        assert_eq!(rewrite_args(argv(&["flimfit", "--help"])), argv(&["flimfit", "--help"]));
    }

    #[test]
    fn config_carries_engine_options() {
        let cli = crate::cli::Cli::parse_from([
            "flimfit", "fit", "-f", "x.bin", "--model-max", "3", "--collapse-threshold", "0.02",
            "--plot",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert_eq!(config.input, PathBuf::from("x.bin"));
        assert_eq!(config.options.max_components, 3);
        assert_eq!(config.options.collapse_threshold, 0.02);
        assert!(config.plot);
        assert!(config.options.validate().is_ok());
    }
}
