//! The model bank: additive multi-exponential decays with a constant background.
//!
//! The fitter relies on two primitive operations:
//! - build a design row for a given time and taus (for the linear subproblem)
//! - predict y(t) given the full parameter vector (for residuals/plots)
//!
//! Parameters are laid out as `[A1, tau1, ..., Ak, tauk, B]`.

use crate::domain::ModelKind;

/// One model of the bank: arity, formula and evaluator.
#[derive(Debug, Clone, Copy)]
pub struct ModelDescriptor {
    pub kind: ModelKind,
    /// Number of parameters (`2k + 1`).
    pub arity: usize,
    pub formula: &'static str,
    pub eval: fn(f64, &[f64]) -> f64,
}

/// All models, in fitting order (simplest first).
pub static MODEL_BANK: [ModelDescriptor; 4] = [
    ModelDescriptor {
        kind: ModelKind::OneExp,
        arity: 3,
        formula: "A1*exp(-t/tau1) + B",
        eval: one_exp,
    },
    ModelDescriptor {
        kind: ModelKind::TwoExp,
        arity: 5,
        formula: "A1*exp(-t/tau1) + A2*exp(-t/tau2) + B",
        eval: two_exp,
    },
    ModelDescriptor {
        kind: ModelKind::ThreeExp,
        arity: 7,
        formula: "A1*exp(-t/tau1) + A2*exp(-t/tau2) + A3*exp(-t/tau3) + B",
        eval: three_exp,
    },
    ModelDescriptor {
        kind: ModelKind::FourExp,
        arity: 9,
        formula: "A1*exp(-t/tau1) + A2*exp(-t/tau2) + A3*exp(-t/tau3) + A4*exp(-t/tau4) + B",
        eval: four_exp,
    },
];

/// Look up the descriptor for a model kind.
pub fn descriptor(kind: ModelKind) -> &'static ModelDescriptor {
    &MODEL_BANK[kind.components() - 1]
}

fn one_exp(t: f64, p: &[f64]) -> f64 {
    p[0] * (-t / p[1]).exp() + p[2]
}

fn two_exp(t: f64, p: &[f64]) -> f64 {
    p[0] * (-t / p[1]).exp() + p[2] * (-t / p[3]).exp() + p[4]
}

fn three_exp(t: f64, p: &[f64]) -> f64 {
    p[0] * (-t / p[1]).exp() + p[2] * (-t / p[3]).exp() + p[4] * (-t / p[5]).exp() + p[6]
}

fn four_exp(t: f64, p: &[f64]) -> f64 {
    p[0] * (-t / p[1]).exp()
        + p[2] * (-t / p[3]).exp()
        + p[4] * (-t / p[5]).exp()
        + p[6] * (-t / p[7]).exp()
        + p[8]
}

/// Predict `y(t)` for the given model kind.
pub fn predict(kind: ModelKind, t: f64, params: &[f64]) -> f64 {
    (descriptor(kind).eval)(t, params)
}

/// Fill a design row for fixed taus: `[exp(-t/tau_1), ..., exp(-t/tau_k), 1]`.
///
/// With the taus held fixed the model is linear in the amplitudes and the
/// background, which is what the seed search exploits.
///
/// # Panics
/// Panics if `out` is shorter than `taus.len() + 1`.
pub fn fill_design_row(t: f64, taus: &[f64], out: &mut [f64]) {
    for (slot, &tau) in out.iter_mut().zip(taus) {
        *slot = (-t / tau).exp();
    }
    out[taus.len()] = 1.0;
}

/// Interleave linear coefficients `[A1..Ak, B]` with `taus` into the
/// `[A1, tau1, ..., B]` parameter layout.
pub fn interleave(amplitudes_and_background: &[f64], taus: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(2 * taus.len() + 1);
    for (a, tau) in amplitudes_and_background.iter().zip(taus) {
        out.push(*a);
        out.push(*tau);
    }
    out.push(amplitudes_and_background[taus.len()]);
    out
}
