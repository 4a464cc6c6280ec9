//! Read/write batch result JSON files.
//!
//! A batch file is the portable outcome of one `fit` run: one entry per
//! channel carrying either a serialized fit or the error text. `show` reads
//! these back without refitting.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::FitResult;
use crate::error::{AppError, RecordError};
use crate::fit::batch::ChannelFit;
use crate::io::record::FitRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitBatchFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    /// Acquisition file the batch was fit from.
    pub source: String,
    pub channels: Vec<ChannelRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelRecord {
    /// Rebuild the fit. `Ok(None)` for a channel that failed to fit.
    pub fn into_fit(self) -> Result<Option<FitResult>, RecordError> {
        self.fit.map(FitResult::try_from).transpose()
    }
}

impl FitBatchFile {
    pub fn from_fits(source: &Path, fits: &[ChannelFit]) -> Self {
        Self {
            tool: "flimfit".to_string(),
            generated_at: Utc::now(),
            source: source.display().to_string(),
            channels: fits
                .iter()
                .map(|f| match f.outcome.as_ref().map(FitRecord::from) {
                    Ok(record) => match record.check_finite() {
                        Ok(()) => ChannelRecord {
                            channel: f.channel,
                            fit: Some(record),
                            error: None,
                        },
                        Err(e) => ChannelRecord {
                            channel: f.channel,
                            fit: None,
                            error: Some(e.to_string()),
                        },
                    },
                    Err(e) => ChannelRecord {
                        channel: f.channel,
                        fit: None,
                        error: Some(e.to_string()),
                    },
                })
                .collect(),
        }
    }
}

/// Write a batch JSON file.
pub fn write_batch_json(path: &Path, batch: &FitBatchFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(BufWriter::new(file), batch)
        .map_err(|e| AppError::new(2, format!("Failed to write results JSON: {e}")))?;

    Ok(())
}

/// Read a batch JSON file.
pub fn read_batch_json(path: &Path) -> Result<FitBatchFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open results JSON '{}': {e}", path.display())))?;
    let batch: FitBatchFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("Invalid results JSON: {e}")))?;
    Ok(batch)
}
