//! Phasor (G, S) transform of a decay histogram.
//!
//! For a periodic excitation with period `T` and harmonic `n`, `ω = 2πn/T`:
//!
//! - `G = Σ I(t)·cos(ωt) / Σ I(t)`
//! - `S = Σ I(t)·sin(ωt) / Σ I(t)`
//!
//! A single exponential with lifetime τ lands on the universal semicircle at
//! `G = 1/(1 + (ωτ)²)`, `S = ωτ/(1 + (ωτ)²)` (in the continuous limit).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::domain::DecayCurve;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Phasor {
    pub g: f64,
    pub s: f64,
}

impl Phasor {
    /// Apparent lifetime from the phase angle, `τφ = S / (G ω)`.
    pub fn phase_lifetime(&self, period_ns: f64, harmonic: u32) -> Option<f64> {
        let omega = 2.0 * PI * harmonic as f64 / period_ns;
        if self.g.abs() < f64::EPSILON || omega <= 0.0 {
            return None;
        }
        Some(self.s / (self.g * omega))
    }
}

/// Compute the phasor of `curve` at the given harmonic.
///
/// Returns `None` for a zero-sum curve or a non-positive period.
pub fn phasor(curve: &DecayCurve, period_ns: f64, harmonic: u32) -> Option<Phasor> {
    if !(period_ns.is_finite() && period_ns > 0.0) || harmonic == 0 {
        return None;
    }
    let omega = 2.0 * PI * harmonic as f64 / period_ns;

    let mut total = 0.0;
    let mut g = 0.0;
    let mut s = 0.0;
    for (&t, &y) in curve.x_values.iter().zip(&curve.y_values) {
        total += y;
        g += y * (omega * t).cos();
        s += y * (omega * t).sin();
    }
    if total <= 0.0 {
        return None;
    }
    Some(Phasor {
        g: g / total,
        s: s / total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::linspace;

    #[test]
    fn single_exponential_lies_near_semicircle() {
        let period = 50.0;
        let tau = 2.5;
        // Fine sampling over a whole period so the discrete sum approximates
        // the integral.
        let x = linspace(0.0, period, 4096);
        let y: Vec<f64> = x.iter().map(|t| 1000.0 * (-t / tau).exp()).collect();
        let curve = DecayCurve::new(0, x, y);

        let p = phasor(&curve, period, 1).unwrap();
        let wt = 2.0 * PI / period * tau;
        let g_expected = 1.0 / (1.0 + wt * wt);
        let s_expected = wt / (1.0 + wt * wt);
        assert!((p.g - g_expected).abs() < 0.01, "g={} expected={g_expected}", p.g);
        assert!((p.s - s_expected).abs() < 0.01, "s={} expected={s_expected}", p.s);

        let tau_phi = p.phase_lifetime(period, 1).unwrap();
        assert!((tau_phi - tau).abs() / tau < 0.05);
    }

    #[test]
    fn zero_curve_has_no_phasor() {
        let curve = DecayCurve::new(0, vec![0.0, 1.0], vec![0.0, 0.0]);
        assert!(phasor(&curve, 10.0, 1).is_none());
    }
}
