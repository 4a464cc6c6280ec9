//! Small numeric helpers shared by the fitter and the reporting code.

/// Guards the chi-square denominator against zero expected counts.
pub const CHI_SQUARE_EPS: f64 = 1e-10;

/// `n` evenly spaced samples over `[start, stop]`, both ends included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n as f64 - 1.0);
            let mut out: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            out[n - 1] = stop;
            out
        }
    }
}

/// Index of the first maximum. `None` for an empty slice.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub fn sum_squared_error(observed: &[f64], expected: &[f64]) -> f64 {
    observed
        .iter()
        .zip(expected)
        .map(|(o, e)| (o - e) * (o - e))
        .sum()
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// A constant observation vector has no variance to explain: a perfect fit
/// scores 1, anything else 0.
pub fn r_squared(observed: &[f64], expected: &[f64]) -> f64 {
    let n = observed.len();
    if n == 0 {
        return 0.0;
    }
    let mean = observed.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = observed.iter().map(|o| (o - mean) * (o - mean)).sum();
    let ss_res = sum_squared_error(observed, expected);
    if ss_tot <= 0.0 {
        return if ss_res <= 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Reduced Pearson chi-square, `Σ (o - e)² / (|e| + eps) / (N - P)`.
///
/// Returns `None` when there are no degrees of freedom left.
pub fn reduced_chi_square(observed: &[f64], expected: &[f64], n_params: usize) -> Option<f64> {
    let n = observed.len();
    if n <= n_params {
        return None;
    }
    let chi2: f64 = observed
        .iter()
        .zip(expected)
        .map(|(o, e)| (o - e) * (o - e) / (e.abs() + CHI_SQUARE_EPS))
        .sum();
    Some(chi2 / (n - n_params) as f64)
}
