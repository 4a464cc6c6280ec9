//! Command-line parsing for the decay fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting/math code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "flimfit", version, about = "Multi-exponential fluorescence decay fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every channel of an acquisition file, print reports, and optionally plot/export.
    Fit(FitArgs),
    /// Print a previously exported results JSON without refitting.
    Show(ShowArgs),
    /// Write a synthetic acquisition file.
    Synth(SynthArgs),
    /// Print phasor coordinates (G, S) per channel.
    Phasor(PhasorArgs),
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Acquisition file (SP01/SPF1).
    #[arg(short = 'f', long, value_name = "FILE")]
    pub input: PathBuf,

    /// Fit only these channels (repeatable). Defaults to every active channel.
    #[arg(short = 'c', long = "channel", value_name = "N")]
    pub channels: Vec<u32>,

    /// Largest number of exponential components to try (1-4).
    #[arg(long, default_value_t = 4)]
    pub model_max: usize,

    /// Residual evaluation budget per model.
    #[arg(long, default_value_t = 20_000)]
    pub max_evaluations: usize,

    /// Relative lifetime difference below which components are merged.
    #[arg(long, default_value_t = 0.01)]
    pub collapse_threshold: f64,

    /// Reject curves whose time axis and counts differ in length.
    #[arg(long)]
    pub strict: bool,

    /// Render an ASCII plot per channel.
    #[arg(long)]
    pub plot: bool,

    /// Use a log10 count axis for plots.
    #[arg(long)]
    pub log: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export all channel results to JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Export one CSV per fitted channel into this directory.
    #[arg(long = "export-csv", value_name = "DIR")]
    pub export_csv: Option<PathBuf>,

    /// Write a markdown bundle with every candidate model to `./debug`.
    #[arg(long)]
    pub debug: bool,
}

/// Options for printing saved results.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Results JSON produced by `flimfit fit --export-json`.
    #[arg(long, value_name = "JSON")]
    pub results: PathBuf,

    /// Render an ASCII plot per channel.
    #[arg(long)]
    pub plot: bool,

    /// Use a log10 count axis for plots.
    #[arg(long)]
    pub log: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for synthetic file generation.
#[derive(Debug, Parser)]
pub struct SynthArgs {
    /// Output acquisition file.
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: PathBuf,

    /// Component lifetimes in ns (repeatable).
    #[arg(long = "tau", default_values_t = vec![2.5])]
    pub taus: Vec<f64>,

    /// Component amplitudes in counts (repeatable, one per --tau).
    #[arg(long = "amplitude", default_values_t = vec![1000.0])]
    pub amplitudes: Vec<f64>,

    /// Constant background counts per bin.
    #[arg(long, default_value_t = 10.0)]
    pub background: f64,

    /// Active channel indices (repeatable).
    #[arg(long = "channels", default_values_t = vec![0])]
    pub channels: Vec<u32>,

    /// Number of timestamped records.
    #[arg(long, default_value_t = 10)]
    pub records: usize,

    /// Laser period in ns.
    #[arg(long, default_value_t = 25.0)]
    pub period: f64,

    /// Bins of linear rise before the peak.
    #[arg(long, default_value_t = 8)]
    pub rise_bins: usize,

    /// Disable Poisson counting noise.
    #[arg(long)]
    pub no_noise: bool,

    /// Random seed for the counting noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for the phasor table.
#[derive(Debug, Parser)]
pub struct PhasorArgs {
    /// Acquisition file (SP01/SPF1).
    #[arg(short = 'f', long, value_name = "FILE")]
    pub input: PathBuf,

    /// Harmonic of the laser repetition frequency.
    #[arg(long, default_value_t = 1)]
    pub harmonic: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_flags_parse() {
        let cli = Cli::parse_from([
            "flimfit", "fit", "-f", "a.bin", "-c", "1", "-c", "3", "--model-max", "2", "--strict",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.input, PathBuf::from("a.bin"));
        assert_eq!(args.channels, vec![1, 3]);
        assert_eq!(args.model_max, 2);
        assert!(args.strict);
        assert_eq!(args.max_evaluations, 20_000);
    }

    #[test]
    fn synth_accepts_repeated_components() {
        let cli = Cli::parse_from([
            "flimfit", "synth", "-o", "s.bin", "--tau", "0.5", "--tau", "4", "--amplitude", "300",
            "--amplitude", "100",
        ]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.taus, vec![0.5, 4.0]);
        assert_eq!(args.amplitudes, vec![300.0, 100.0]);
        assert_eq!(args.channels, vec![0]);
    }

    #[test]
    fn fit_requires_an_input_file() {
        assert!(Cli::try_parse_from(["flimfit", "fit", "--plot"]).is_err());
        assert!(Cli::try_parse_from(["flimfit", "phasor"]).is_err());
    }
}
