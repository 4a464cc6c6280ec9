//! Shared pipeline logic used by the `fit` and `phasor` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! acquisition file -> per-channel decay curves -> batch fit (worker thread)
//!
//! The commands can then focus on presentation (printing, plots, exports).

use std::path::Path;

use tracing::info;

use crate::domain::{DecayCurve, FitConfig};
use crate::error::AppError;
use crate::fit::batch::{BatchEvent, BatchWorker, ChannelFit};
use crate::io::spc::{read_spc, SpcFile};
use crate::math::{phasor, Phasor};

/// All computed outputs of a single `flimfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub file: SpcFile,
    pub curves: Vec<DecayCurve>,
    pub fits: Vec<ChannelFit>,
}

/// Read an acquisition file and build the decay curves to work on.
///
/// `channels` restricts the output; an empty list keeps every active channel.
pub fn load_curves(input: &Path, channels: &[u32]) -> Result<(SpcFile, Vec<DecayCurve>), AppError> {
    let file = read_spc(input)?;
    info!(
        path = %input.display(),
        kind = ?file.kind,
        records = file.records.len(),
        "loaded acquisition file"
    );

    if let Some(missing) = channels
        .iter()
        .find(|c| !file.metadata.channels.contains(c))
    {
        return Err(AppError::new(
            2,
            format!(
                "Channel {missing} is not active in {} (active: {:?}).",
                input.display(),
                file.metadata.channels
            ),
        ));
    }

    let curves = file
        .decay_curves()
        .into_iter()
        .filter(|c| channels.is_empty() || channels.contains(&c.channel))
        .collect();

    Ok((file, curves))
}

/// Execute the fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    config.options.validate()?;
    let (file, curves) = load_curves(&config.input, &config.channels)?;

    // Fits run off the calling thread; we simply block for the single event.
    let worker = BatchWorker::spawn(curves.clone(), config.options.clone());
    let fits = match worker.wait() {
        Some(BatchEvent::Completed(fits)) => fits,
        Some(BatchEvent::Cancelled { completed }) => {
            return Err(AppError::new(
                4,
                format!("Fitting was cancelled after {} channel(s).", completed.len()),
            ));
        }
        None => return Err(AppError::new(4, "Fit worker terminated unexpectedly.")),
    };

    Ok(RunOutput { file, curves, fits })
}

/// Phasor coordinates per active channel, plus the laser period they refer to.
pub fn run_phasor(
    input: &Path,
    harmonic: u32,
) -> Result<(f64, Vec<(u32, Option<Phasor>)>), AppError> {
    if harmonic == 0 {
        return Err(AppError::new(2, "Harmonic must be >= 1."));
    }
    let (file, curves) = load_curves(input, &[])?;
    let period = file.metadata.laser_period_ns;

    let rows = curves
        .iter()
        .map(|c| (c.channel, phasor(c, period, harmonic)))
        .collect();
    Ok((period, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{synthetic_file, SyntheticDecay};
    use crate::domain::FitOptions;
    use crate::io::spc::write_spc;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config(input: PathBuf, channels: Vec<u32>) -> FitConfig {
        FitConfig {
            input,
            channels,
            options: FitOptions::default(),
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export_json: None,
            export_csv: None,
            debug: false,
        }
    }

    #[test]
    fn fits_selected_channels_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acq.bin");
        let spec = SyntheticDecay {
            rise_bins: 8,
            ..SyntheticDecay::default()
        };
        write_spc(&path, &synthetic_file(&spec, &[1, 4], 5).unwrap()).unwrap();

        let run = run_fit(&config(path.clone(), vec![4])).unwrap();
        assert_eq!(run.curves.len(), 1);
        assert_eq!(run.fits.len(), 1);
        let fit = run.fits[0].outcome.as_ref().unwrap();
        assert_eq!(fit.channel, 4);
        assert_eq!(fit.decay_start, 8);
        assert!((fit.taus()[0] - 2.5).abs() / 2.5 < 0.02);

        let err = run_fit(&config(path, vec![2])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn phasor_rows_cover_every_channel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acq.bin");
        write_spc(&path, &synthetic_file(&SyntheticDecay::default(), &[0, 2], 2).unwrap()).unwrap();

        let (period, rows) = run_phasor(&path, 1).unwrap();
        assert_eq!(period, 25.0);
        assert_eq!(rows.iter().map(|r| r.0).collect::<Vec<_>>(), vec![0, 2]);
        assert!(rows.iter().all(|r| r.1.is_some()));
        assert!(run_phasor(&path, 0).is_err());
    }
}
