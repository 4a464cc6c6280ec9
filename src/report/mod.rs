//! Reporting utilities: component shares and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::FitResult;

/// One component's contribution to the fitted signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentShare {
    pub amplitude: f64,
    pub tau: f64,
    /// `A_i / (SUM + B)`.
    pub fraction: f64,
}

/// Shares of every component plus the background.
#[derive(Debug, Clone, PartialEq)]
pub struct Shares {
    pub components: Vec<ComponentShare>,
    pub background_fraction: f64,
}

/// Compute percentage-of-total shares for a fit.
///
/// `SUM` covers amplitudes only. A degenerate `SUM + B == 0` reports every
/// fraction as zero instead of dividing by zero.
pub fn component_shares(fit: &FitResult) -> Shares {
    shares_from_parameters(fit.parameters.as_slice(), fit.model.components())
}

/// Same as [`component_shares`] on a raw `[A1, tau1, ..., B]` vector.
pub fn shares_from_parameters(params: &[f64], components: usize) -> Shares {
    let background = params[2 * components];
    let sum: f64 = (0..components).map(|c| params[2 * c]).sum();
    let total = sum + background;

    let frac = |v: f64| if total == 0.0 { 0.0 } else { v / total };

    Shares {
        components: (0..components)
            .map(|c| ComponentShare {
                amplitude: params[2 * c],
                tau: params[2 * c + 1],
                fraction: frac(params[2 * c]),
            })
            .collect(),
        background_fraction: frac(background),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_normalize_to_one() {
        let shares = shares_from_parameters(&[300.0, 0.8, 100.0, 4.0, 100.0], 2);
        assert!((shares.components[0].fraction - 0.6).abs() < 1e-12);
        assert!((shares.components[1].fraction - 0.2).abs() < 1e-12);
        assert!((shares.background_fraction - 0.2).abs() < 1e-12);
        assert_eq!(shares.components[1].tau, 4.0);
    }

    #[test]
    fn zero_total_reports_zero_fractions() {
        let shares = shares_from_parameters(&[5.0, 2.0, -5.0], 1);
        assert_eq!(shares.components[0].fraction, 0.0);
        assert_eq!(shares.background_fraction, 0.0);
    }
}
