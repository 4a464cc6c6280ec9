//! Levenberg–Marquardt refinement of a multi-exponential decay.
//!
//! The solver works on `[A1, ln tau1, ..., Ak, ln tauk, B]`: optimising the
//! log-lifetime keeps every tau positive without box constraints. Callers see
//! the natural `[A1, tau1, ..., B]` layout on both sides.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use nalgebra::{DMatrix, DVector, Dyn, Owned};

/// Clamp for `ln tau` so a runaway step cannot overflow `exp`.
const LN_TAU_BOUND: f64 = 30.0;

/// Converged solver output, natural parameter layout.
#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub params: Vec<f64>,
    pub evaluations: usize,
}

struct DecayProblem<'a> {
    components: usize,
    t: &'a [f64],
    y: &'a [f64],
    params: DVector<f64>,
}

impl<'a> DecayProblem<'a> {
    fn new(components: usize, t: &'a [f64], y: &'a [f64], start: &[f64]) -> Self {
        let mut params = DVector::from_column_slice(start);
        for c in 0..components {
            params[2 * c + 1] = start[2 * c + 1].max(f64::MIN_POSITIVE).ln();
        }
        Self {
            components,
            t,
            y,
            params,
        }
    }

    fn tau(&self, c: usize) -> f64 {
        self.params[2 * c + 1]
            .clamp(-LN_TAU_BOUND, LN_TAU_BOUND)
            .exp()
    }

    fn natural_params(&self) -> Vec<f64> {
        let mut out: Vec<f64> = self.params.iter().copied().collect();
        for c in 0..self.components {
            out[2 * c + 1] = self.tau(c);
        }
        out
    }
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for DecayProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.copy_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let k = self.components;
        let background = self.params[2 * k];
        let taus: Vec<f64> = (0..k).map(|c| self.tau(c)).collect();

        let mut r = DVector::zeros(self.t.len());
        for (i, (&t, &y)) in self.t.iter().zip(self.y).enumerate() {
            let mut model = background;
            for (c, &tau) in taus.iter().enumerate() {
                model += self.params[2 * c] * (-t / tau).exp();
            }
            r[i] = model - y;
        }

        if r.iter().all(|v| v.is_finite()) {
            Some(r)
        } else {
            None
        }
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let k = self.components;
        let taus: Vec<f64> = (0..k).map(|c| self.tau(c)).collect();

        let mut jac = DMatrix::zeros(self.t.len(), 2 * k + 1);
        for (row, &t) in self.t.iter().enumerate() {
            for (c, &tau) in taus.iter().enumerate() {
                let e = (-t / tau).exp();
                // d/dA
                jac[(row, 2 * c)] = e;
                // d/d(ln tau) = A e t / tau
                jac[(row, 2 * c + 1)] = self.params[2 * c] * e * t / tau;
            }
            jac[(row, 2 * k)] = 1.0;
        }

        if jac.iter().all(|v| v.is_finite()) {
            Some(jac)
        } else {
            None
        }
    }
}

/// Refine `start` (natural layout) against `(t, y)`.
///
/// `max_evaluations` bounds the number of residual evaluations. Returns the
/// termination reason as an error when the solver does not converge.
pub fn refine(
    components: usize,
    t: &[f64],
    y: &[f64],
    start: &[f64],
    max_evaluations: usize,
) -> Result<SolverOutcome, String> {
    let n_params = 2 * components + 1;
    if start.len() != n_params {
        return Err(format!(
            "start vector has {} parameters, expected {n_params}",
            start.len()
        ));
    }

    // The solver budget is `patience * (n_params + 1)` evaluations.
    let patience = (max_evaluations / (n_params + 1)).max(1);
    let problem = DecayProblem::new(components, t, y, start);
    let (problem, report) = LevenbergMarquardt::new()
        .with_patience(patience)
        .minimize(problem);

    if !report.termination.was_successful() {
        return Err(format!(
            "{:?} after {} evaluations",
            report.termination, report.number_of_evaluations
        ));
    }

    let params = problem.natural_params();
    if params.iter().any(|v| !v.is_finite()) {
        return Err("solver returned non-finite parameters".to_string());
    }

    Ok(SolverOutcome {
        params,
        evaluations: report.number_of_evaluations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::linspace;

    #[test]
    fn refines_single_exponential_from_rough_start() {
        let t = linspace(0.0, 20.0, 200);
        let y: Vec<f64> = t.iter().map(|t| 800.0 * (-t / 2.5).exp() + 12.0).collect();

        let out = refine(1, &t, &y, &[500.0, 1.0, 0.0], 20_000).unwrap();
        assert!((out.params[0] - 800.0).abs() / 800.0 < 1e-6);
        assert!((out.params[1] - 2.5).abs() / 2.5 < 1e-6);
        assert!((out.params[2] - 12.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_wrong_parameter_count() {
        let t = [0.0, 1.0, 2.0, 3.0];
        let y = [4.0, 3.0, 2.0, 1.0];
        assert!(refine(2, &t, &y, &[1.0, 1.0, 0.0], 1000).is_err());
    }
}
