//! JSON-safe mirror of `FitResult`.
//!
//! Array fields become plain `Vec<f64>`; text and scalars pass through. The
//! import direction checks the shape invariants a `FitResult` relies on.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::domain::{FitResult, ModelKind};
use crate::error::RecordError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitRecord {
    pub channel: u32,
    pub model: ModelKind,
    pub model_description: String,
    pub x_values: Vec<f64>,
    pub t_data: Vec<f64>,
    pub y_data: Vec<f64>,
    pub fitted_values: Vec<f64>,
    pub residuals: Vec<f64>,
    pub scale_factor: f64,
    pub decay_start: usize,
    pub parameters: Vec<f64>,
    pub goodness_of_fit: f64,
    pub r_squared: f64,
    pub report: String,
    #[serde(default)]
    pub collapsed: bool,
}

impl From<&FitResult> for FitRecord {
    fn from(fit: &FitResult) -> Self {
        Self {
            channel: fit.channel,
            model: fit.model,
            model_description: fit.model_description.clone(),
            x_values: fit.x_values.as_slice().to_vec(),
            t_data: fit.t_data.as_slice().to_vec(),
            y_data: fit.y_data.as_slice().to_vec(),
            fitted_values: fit.fitted_values.as_slice().to_vec(),
            residuals: fit.residuals.as_slice().to_vec(),
            scale_factor: fit.scale_factor,
            decay_start: fit.decay_start,
            parameters: fit.parameters.as_slice().to_vec(),
            goodness_of_fit: fit.goodness_of_fit,
            r_squared: fit.r_squared,
            report: fit.report.clone(),
            collapsed: fit.collapsed,
        }
    }
}

impl TryFrom<FitRecord> for FitResult {
    type Error = RecordError;

    fn try_from(r: FitRecord) -> Result<Self, Self::Error> {
        if r.decay_start >= r.x_values.len() {
            return Err(RecordError::DecayStart {
                decay_start: r.decay_start,
                len: r.x_values.len(),
            });
        }

        let n = r.x_values.len() - r.decay_start;
        check_len("t_data", r.t_data.len(), n)?;
        check_len("y_data", r.y_data.len(), n)?;
        check_len("fitted_values", r.fitted_values.len(), n)?;
        check_len("residuals", r.residuals.len(), n)?;
        check_len("parameters", r.parameters.len(), r.model.param_count())?;

        Ok(FitResult {
            channel: r.channel,
            model: r.model,
            x_values: DVector::from_vec(r.x_values),
            t_data: DVector::from_vec(r.t_data),
            y_data: DVector::from_vec(r.y_data),
            fitted_values: DVector::from_vec(r.fitted_values),
            residuals: DVector::from_vec(r.residuals),
            scale_factor: r.scale_factor,
            decay_start: r.decay_start,
            parameters: DVector::from_vec(r.parameters),
            goodness_of_fit: r.goodness_of_fit,
            r_squared: r.r_squared,
            model_description: r.model_description,
            report: r.report,
            collapsed: r.collapsed,
        })
    }
}

impl FitRecord {
    /// JSON has no NaN or infinity; serde_json would write them as `null`.
    pub fn check_finite(&self) -> Result<(), RecordError> {
        let arrays: [(&'static str, &[f64]); 6] = [
            ("x_values", self.x_values.as_slice()),
            ("t_data", self.t_data.as_slice()),
            ("y_data", self.y_data.as_slice()),
            ("fitted_values", self.fitted_values.as_slice()),
            ("residuals", self.residuals.as_slice()),
            ("parameters", self.parameters.as_slice()),
        ];
        for (field, values) in arrays {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(RecordError::NonFinite { field, index });
            }
        }

        let scalars = [
            ("scale_factor", self.scale_factor),
            ("goodness_of_fit", self.goodness_of_fit),
            ("r_squared", self.r_squared),
        ];
        for (field, value) in scalars {
            if !value.is_finite() {
                return Err(RecordError::NonFinite { field, index: 0 });
            }
        }
        Ok(())
    }
}

/// Export a fit as a JSON value.
pub fn export_result(fit: &FitResult) -> Result<serde_json::Value, RecordError> {
    let record = FitRecord::from(fit);
    record.check_finite()?;
    Ok(serde_json::to_value(record)?)
}

/// Rebuild a fit from a JSON value produced by [`export_result`].
pub fn import_result(value: serde_json::Value) -> Result<FitResult, RecordError> {
    let record: FitRecord = serde_json::from_value(value)?;
    FitResult::try_from(record)
}

fn check_len(field: &'static str, len: usize, expected: usize) -> Result<(), RecordError> {
    if len != expected {
        return Err(RecordError::Length {
            field,
            len,
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::SyntheticDecay;
    use crate::domain::FitOptions;
    use crate::fit::fit_curve;

    fn noisy_fit() -> FitResult {
        let curve = SyntheticDecay {
            components: vec![(1500.0, 0.7), (600.0, 3.8)],
            background: 9.0,
            rise_bins: 6,
            noise: true,
            seed: 21,
            ..SyntheticDecay::default()
        }
        .curve(3)
        .unwrap();
        fit_curve(&curve, &FitOptions::default()).unwrap().best
    }

    #[test]
    fn round_trip_through_json_text_is_exact() {
        let fit = noisy_fit();
        let text = serde_json::to_string(&export_result(&fit).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let back = import_result(value).unwrap();
        assert_eq!(back, fit);
    }

    #[test]
    fn export_uses_plain_json_types() {
        let fit = noisy_fit();
        let value = export_result(&fit).unwrap();
        assert!(value["t_data"].is_array());
        assert!(value["t_data"][0].is_f64());
        assert_eq!(value["channel"], 3);
        assert_eq!(value["model"], serde_json::json!(fit.model));
        assert_eq!(value["report"], fit.report.as_str());
    }

    #[test]
    fn import_rejects_inconsistent_shapes() {
        let fit = noisy_fit();

        let mut record = FitRecord::from(&fit);
        record.residuals.pop();
        assert!(matches!(
            FitResult::try_from(record),
            Err(RecordError::Length { field: "residuals", .. })
        ));

        let mut record = FitRecord::from(&fit);
        record.parameters.push(1.0);
        assert!(matches!(
            FitResult::try_from(record),
            Err(RecordError::Length { field: "parameters", .. })
        ));

        let mut record = FitRecord::from(&fit);
        record.decay_start = record.x_values.len();
        assert!(matches!(
            FitResult::try_from(record),
            Err(RecordError::DecayStart { .. })
        ));
    }

    #[test]
    fn export_rejects_non_finite_values() {
        let mut fit = noisy_fit();
        fit.residuals[2] = f64::NAN;
        assert!(matches!(
            export_result(&fit),
            Err(RecordError::NonFinite { field: "residuals", index: 2 })
        ));

        let mut fit = noisy_fit();
        fit.goodness_of_fit = f64::INFINITY;
        assert!(matches!(
            export_result(&fit),
            Err(RecordError::NonFinite { field: "goodness_of_fit", .. })
        ));
    }
}
