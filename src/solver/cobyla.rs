use super::{WeightFitResult, WeightSolverTrait, project_to_simplex};
use crate::error::HaloError;
use crate::objective::WeightedFluxObjective;

use cobyla::{Func, RhoBeg, StopTols, minimize};
use ndarray::Array1;
use ordered_float::NotNan;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Stands in for non-finite objective evaluations inside the solver loop:
/// large enough that any feasible finite iterate wins, small enough not to
/// wreck the linear models COBYLA builds.
const NONFINITE_PENALTY: f64 = 1e30;

/// COBYLA (Constrained Optimization BY Linear Approximations) weight solver
///
/// COBYLA is a derivative-free local optimizer that handles constraints,
/// which fits the smoothness objectives exactly: the median normalization
/// makes them non-smooth, so no useful analytic gradient exists. The simplex
/// equality constraint `Σw = 1` is encoded as the inequality pair
/// `Σw − 1 ≥ 0` and `1 − Σw ≥ 0` alongside the `[0, 1]` box bounds, and the
/// final iterate is renormalized onto the simplex so the invariant holds to
/// floating tolerance regardless of how tightly the solver met its
/// constraints.
///
/// The algorithm builds linear approximations to the objective and constraint
/// functions and is described in M.J.D. Powell's 1994 paper "A direct search
/// optimization method that models the objective and constraint functions by
/// linear interpolation".
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename = "Cobyla")]
pub struct CobylaWeightSolver {
    pub niterations: u32,
    pub rhobeg: NotNan<f64>,
    pub ftol_rel: NotNan<f64>,
}

impl CobylaWeightSolver {
    /// Create a new [CobylaWeightSolver].
    ///
    /// # Arguments
    /// - `niterations`: maximum number of objective evaluations; this bounds
    ///   the worst-case latency for pathological pixel matrices
    /// - `rhobeg`: initial change to the weights (controls initial simplex
    ///   size)
    /// - `ftol_rel`: relative tolerance on the objective value for
    ///   convergence
    pub fn new(niterations: u32, rhobeg: f64, ftol_rel: f64) -> Self {
        assert!(niterations > 0, "niterations must be positive");
        assert!(rhobeg > 0.0, "rhobeg must be positive");
        assert!(rhobeg.is_finite(), "rhobeg must be finite");
        assert!(ftol_rel >= 0.0, "ftol_rel must be non-negative");
        assert!(ftol_rel.is_finite(), "ftol_rel must be finite");
        Self {
            niterations,
            rhobeg: NotNan::new(rhobeg).expect("rhobeg must be finite and not NaN"),
            ftol_rel: NotNan::new(ftol_rel).expect("ftol_rel must be finite and not NaN"),
        }
    }

    #[inline]
    pub fn default_niterations() -> u32 {
        3000
    }

    /// Weight magnitudes are O(1/npix), so the initial step is kept well
    /// below the full box
    #[inline]
    pub fn default_rhobeg() -> f64 {
        0.1
    }

    #[inline]
    pub fn default_ftol_rel() -> f64 {
        1e-6
    }
}

impl Default for CobylaWeightSolver {
    fn default() -> Self {
        Self::new(
            Self::default_niterations(),
            Self::default_rhobeg(),
            Self::default_ftol_rel(),
        )
    }
}

impl WeightSolverTrait for CobylaWeightSolver {
    fn minimize_weights(
        &self,
        objective: &WeightedFluxObjective,
        initial: &[f64],
    ) -> Result<WeightFitResult, HaloError> {
        let npix = objective.npix();
        if initial.len() != npix {
            return Err(HaloError::WeightLengthMismatch {
                expected: npix,
                actual: initial.len(),
            });
        }
        let x0 = project_to_simplex(initial.to_vec())?;
        if !objective.evaluate(&x0).is_finite() {
            return Err(HaloError::DegenerateInput(
                "objective is not finite at the initial guess",
            ));
        }

        let n_evals = Cell::new(0_usize);
        let func = |x: &[f64], _user_data: &mut ()| -> f64 {
            n_evals.set(n_evals.get() + 1);
            let value = objective.evaluate(x);
            if value.is_finite() {
                value
            } else {
                NONFINITE_PENALTY
            }
        };

        let bounds = vec![(0.0, 1.0); npix];
        let sum_to_one_lo = |x: &[f64], _user_data: &mut ()| x.iter().sum::<f64>() - 1.0;
        let sum_to_one_hi = |x: &[f64], _user_data: &mut ()| 1.0 - x.iter().sum::<f64>();
        let constraints: Vec<&dyn Func<()>> = vec![&sum_to_one_lo, &sum_to_one_hi];

        let stop_tol = StopTols {
            ftol_rel: self.ftol_rel.into(),
            ..StopTols::default()
        };

        let result = minimize(
            func,
            &x0,
            &bounds,
            &constraints,
            (),
            self.niterations as usize,
            RhoBeg::All(self.rhobeg.into()),
            Some(stop_tol),
        );

        let (converged, x_best, f_best) = match result {
            Ok((status, x, f)) => {
                let converged = matches!(
                    status,
                    cobyla::SuccessStatus::Success
                        | cobyla::SuccessStatus::FtolReached
                        | cobyla::SuccessStatus::XtolReached
                );
                (converged, x, f)
            }
            // Best-effort iterate: non-convergence is recoverable, downstream
            // scoring still works on a finite solution
            Err((_status, x, f)) => (false, x, f),
        };
        log::debug!(
            "COBYLA finished after {} evaluations, converged: {}, objective: {:.6e}",
            n_evals.get(),
            converged,
            f_best,
        );

        let weights = Array1::from(project_to_simplex(x_best)?);
        Ok(WeightFitResult {
            weights,
            objective: f_best,
            converged,
            n_evals: n_evals.get(),
        })
    }
}
