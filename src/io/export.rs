//! Export per-channel fits to CSV.
//!
//! One file per channel, columns in original count units so the export is
//! easy to consume in spreadsheets or downstream scripts.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::domain::FitResult;
use crate::error::AppError;

/// Write `t, counts, fitted, residual` rows for one fit.
pub fn write_fit_csv(path: &Path, fit: &FitResult) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "t_ns,counts,fitted,residual")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    let s = fit.scale_factor;
    for i in 0..fit.t_data.len() {
        writeln!(
            w,
            "{:.6},{:.4},{:.4},{:.4}",
            fit.t_data[i],
            fit.y_data[i] * s,
            fit.fitted_values[i] * s,
            fit.residuals[i] * s,
        )
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    w.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write one `channel_<n>.csv` per fit into `dir`, creating it if needed.
pub fn write_fits_csv_dir<'a>(
    dir: &Path,
    fits: impl IntoIterator<Item = &'a FitResult>,
) -> Result<Vec<PathBuf>, AppError> {
    create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create export dir '{}': {e}", dir.display())))?;

    let mut written = Vec::new();
    for fit in fits {
        let path = dir.join(format!("channel_{}.csv", fit.channel));
        write_fit_csv(&path, fit)?;
        written.push(path);
    }
    Ok(written)
}
