//! Linear least squares solver.
//!
//! With every tau held fixed, a multi-exponential decay is linear in its
//! amplitudes and background:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2,   x_i = [exp(-t_i/τ_1), ..., exp(-t_i/τ_k), 1]
//! ```
//!
//! The seed search solves this many times, once per candidate tau tuple.
//!
//! Implementation choices:
//! - SVD, because the design matrix is tall (hundreds of rows, 2–5 columns)
//!   and columns for nearby taus are nearly collinear.
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
