//! Synthetic decay generation.
//!
//! Used by tests as fixtures and by the `synth` command to produce
//! acquisition files without hardware.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Poisson;

use crate::domain::{DecayCurve, HISTOGRAM_BINS};
use crate::error::AppError;
use crate::io::spc::{FileKind, SpcFile, SpcMetadata, SpcRecord};
use crate::math::linspace;

/// Parameters of a synthetic multi-exponential decay.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticDecay {
    /// `(amplitude, tau_ns)` per component.
    pub components: Vec<(f64, f64)>,
    pub background: f64,
    pub period_ns: f64,
    pub bins: usize,
    /// Bins of linear rise before the peak; the decay starts at this bin.
    pub rise_bins: usize,
    /// Draw Poisson counting noise around the expected counts.
    pub noise: bool,
    pub seed: u64,
}

impl Default for SyntheticDecay {
    fn default() -> Self {
        Self {
            components: vec![(1000.0, 2.5)],
            background: 10.0,
            period_ns: 25.0,
            bins: HISTOGRAM_BINS,
            rise_bins: 0,
            noise: false,
            seed: 42,
        }
    }
}

impl SyntheticDecay {
    fn validate(&self) -> Result<(), AppError> {
        if self.components.is_empty() {
            return Err(AppError::new(2, "At least one decay component is required."));
        }
        if self
            .components
            .iter()
            .any(|&(a, tau)| !(a.is_finite() && a >= 0.0 && tau.is_finite() && tau > 0.0))
        {
            return Err(AppError::new(
                2,
                "Amplitudes must be >= 0 and lifetimes > 0.",
            ));
        }
        if !(self.background.is_finite() && self.background >= 0.0) {
            return Err(AppError::new(2, "Background must be >= 0."));
        }
        if !(self.period_ns.is_finite() && self.period_ns > 0.0) {
            return Err(AppError::new(2, "Laser period must be > 0."));
        }
        if self.bins < 2 || self.rise_bins >= self.bins {
            return Err(AppError::new(
                2,
                format!("Need >= 2 bins and rise_bins < bins (bins={}, rise_bins={}).", self.bins, self.rise_bins),
            ));
        }
        Ok(())
    }

    /// Noise-free expected counts per bin.
    pub fn expected_counts(&self) -> Result<Vec<f64>, AppError> {
        self.validate()?;
        let x = linspace(0.0, self.period_ns, self.bins);
        let peak: f64 = self.components.iter().map(|(a, _)| a).sum();
        let t0 = x[self.rise_bins];

        Ok(x.iter()
            .enumerate()
            .map(|(i, &t)| {
                if i < self.rise_bins {
                    self.background + peak * i as f64 / self.rise_bins as f64
                } else {
                    let dt = t - t0;
                    self.background
                        + self
                            .components
                            .iter()
                            .map(|&(a, tau)| a * (-dt / tau).exp())
                            .sum::<f64>()
                }
            })
            .collect())
    }

    /// Build the decay curve for `channel`.
    pub fn curve(&self, channel: u32) -> Result<DecayCurve, AppError> {
        let expected = self.expected_counts()?;
        let x = linspace(0.0, self.period_ns, self.bins);

        let y = if self.noise {
            let mut rng = StdRng::seed_from_u64(self.seed ^ u64::from(channel));
            expected
                .iter()
                .map(|&lambda| poisson_draw(&mut rng, lambda))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            expected
        };

        Ok(DecayCurve::new(channel, x, y))
    }
}

/// Build an acquisition file with `records` timestamped histograms per
/// channel. Expected counts are split evenly across records, so summing the
/// records gives back (approximately) the requested decay.
pub fn synthetic_file(
    spec: &SyntheticDecay,
    channels: &[u32],
    records: usize,
) -> Result<SpcFile, AppError> {
    if records == 0 {
        return Err(AppError::new(2, "Record count must be > 0."));
    }
    if spec.bins != HISTOGRAM_BINS {
        return Err(AppError::new(
            2,
            format!("Acquisition files use {HISTOGRAM_BINS} bins, got {}.", spec.bins),
        ));
    }
    let per_record: Vec<f64> = spec
        .expected_counts()?
        .into_iter()
        .map(|v| v / records as f64)
        .collect();

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let mut out = Vec::with_capacity(records);
    for r in 0..records {
        let mut histograms = Vec::with_capacity(channels.len());
        for _ in channels {
            let mut h = Vec::with_capacity(HISTOGRAM_BINS);
            for &lambda in &per_record {
                let v = if spec.noise {
                    poisson_draw(&mut rng, lambda)?
                } else {
                    lambda.round()
                };
                h.push(v.min(u32::MAX as f64) as u32);
            }
            histograms.push(h);
        }
        out.push(SpcRecord {
            timestamp_ns: r as f64 * 1.0e9,
            histograms,
        });
    }

    Ok(SpcFile {
        kind: FileKind::Spectroscopy,
        metadata: SpcMetadata {
            channels: channels.to_vec(),
            laser_period_ns: spec.period_ns,
            extra: serde_json::Map::new(),
        },
        records: out,
    })
}

fn poisson_draw(rng: &mut StdRng, lambda: f64) -> Result<f64, AppError> {
    if lambda <= 0.0 {
        return Ok(0.0);
    }
    let dist = Poisson::new(lambda)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    Ok(dist.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noiseless_curve_peaks_after_rise() {
        let spec = SyntheticDecay {
            rise_bins: 12,
            ..SyntheticDecay::default()
        };
        let curve = spec.curve(0).unwrap();
        assert_eq!(curve.y_values.len(), HISTOGRAM_BINS);
        assert_eq!(crate::math::argmax(&curve.y_values), Some(12));
        assert!((curve.y_values[12] - 1010.0).abs() < 1e-9);
    }

    #[test]
    fn noise_is_seeded_per_channel() {
        let spec = SyntheticDecay {
            noise: true,
            ..SyntheticDecay::default()
        };
        assert_eq!(spec.curve(1).unwrap(), spec.curve(1).unwrap());
        assert_ne!(spec.curve(1).unwrap(), spec.curve(2).unwrap());
        assert!(spec.curve(1).unwrap().y_values.iter().all(|v| v.fract() == 0.0));
    }

    #[test]
    fn file_records_sum_to_expected_counts() {
        let spec = SyntheticDecay::default();
        let file = synthetic_file(&spec, &[0, 3], 4).unwrap();
        assert_eq!(file.records.len(), 4);

        let curves = file.decay_curves();
        assert_eq!(curves.len(), 2);
        assert_eq!(curves[1].channel, 3);
        // 1010 / 4 rounds to 253 per record.
        assert_eq!(curves[0].y_values[0], 1012.0);
    }

    #[test]
    fn rejects_non_positive_lifetime() {
        let spec = SyntheticDecay {
            components: vec![(100.0, 0.0)],
            ..SyntheticDecay::default()
        };
        assert_eq!(spec.curve(0).unwrap_err().exit_code(), 2);
    }
}
