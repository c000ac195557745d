//! Constrained weight optimization
//!
//! A solver implementation receives an objective, box bounds on every weight
//! and the simplex equality constraint, and returns a solution plus a
//! convergence flag and evaluation count, so alternate back-ends can be
//! substituted without touching callers. The
//! objective is non-convex in the weights (per-vector median normalization,
//! higher-order difference penalties), so results are local optima sensitive
//! to the initial guess; callers compare reconstructions by score, never by
//! exact weight values.

mod cobyla;
pub use self::cobyla::CobylaWeightSolver;

use crate::error::HaloError;
use crate::objective::WeightedFluxObjective;

use enum_dispatch::enum_dispatch;
use ndarray::Array1;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Weight sums below this are treated as a collapsed, non-recoverable iterate
const MIN_WEIGHT_SUM: f64 = 1e-12;

/// Result of one constrained weight optimization
///
/// `converged: false` marks an exhausted iteration budget: the weights are
/// still the best iterate found, satisfy the constraints, and remain usable
/// for downstream noise scoring; the caller decides whether to retry from a
/// different initial guess.
#[derive(Clone, Debug)]
pub struct WeightFitResult {
    /// Per-pixel weights in [0, 1], summing to one
    pub weights: Array1<f64>,
    /// Final objective value reported by the solver
    pub objective: f64,
    pub converged: bool,
    /// Number of objective evaluations spent
    pub n_evals: usize,
}

#[enum_dispatch]
pub trait WeightSolverTrait {
    /// Minimize `objective` over the weight simplex
    ///
    /// `initial` must have one entry per pixel row; it is renormalized onto
    /// the simplex before the first evaluation, so any non-negative
    /// normalization is accepted.
    fn minimize_weights(
        &self,
        objective: &WeightedFluxObjective,
        initial: &[f64],
    ) -> Result<WeightFitResult, HaloError>;
}

/// All weight solvers are available as variants of this enum
#[enum_dispatch(WeightSolverTrait)]
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WeightSolver {
    Cobyla(CobylaWeightSolver),
}

impl Default for WeightSolver {
    fn default() -> Self {
        CobylaWeightSolver::default().into()
    }
}

/// Uniformly random weights renormalized to the simplex, the usual initial
/// guess for a weight optimization
pub fn random_simplex_weights(npix: usize, rng: &mut impl Rng) -> Vec<f64> {
    let weights: Vec<f64> = (0..npix).map(|_| rng.random::<f64>()).collect();
    // U(0,1) draws cannot all be zero in practice; the projection also guards
    project_to_simplex(weights).unwrap_or_else(|_| uniform_weights(npix))
}

/// Equal weights summing to one
pub fn uniform_weights(npix: usize) -> Vec<f64> {
    vec![1.0 / npix as f64; npix]
}

/// Clamp to the box and rescale so the sum is exactly one
pub(crate) fn project_to_simplex(mut weights: Vec<f64>) -> Result<Vec<f64>, HaloError> {
    for w in &mut weights {
        *w = w.clamp(0.0, 1.0);
    }
    let sum: f64 = weights.iter().sum();
    if !(sum.is_finite() && sum > MIN_WEIGHT_SUM) {
        return Err(HaloError::DegenerateInput("weight sum collapsed to zero"));
    }
    for w in &mut weights {
        *w = (*w / sum).clamp(0.0, 1.0);
    }
    Ok(weights)
}
