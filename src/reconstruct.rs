//! Light-curve extraction and the two-stage reconstruction pipeline

use crate::array_stats::nanmedian;
use crate::error::HaloError;
use crate::objective::{Smoothness, WeightedFluxObjective};
use crate::solver::{WeightFitResult, WeightSolver, WeightSolverTrait};

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Medians below this are considered degenerate for normalization purposes
const MIN_MEDIAN: f64 = 1e-12;

/// Plain-aperture light curve: the unweighted sum of all pixel vectors
pub fn raw_light_curve(pixel_vectors: ArrayView2<f64>) -> Array1<f64> {
    pixel_vectors.sum_axis(Axis(0))
}

/// Weight vector contracted against the pixel matrix, one flux per cadence
pub fn weighted_light_curve(
    weights: ArrayView1<f64>,
    pixel_vectors: ArrayView2<f64>,
) -> Result<Array1<f64>, HaloError> {
    if weights.len() != pixel_vectors.nrows() {
        return Err(HaloError::WeightLengthMismatch {
            expected: pixel_vectors.nrows(),
            actual: weights.len(),
        });
    }
    Ok(weights.dot(&pixel_vectors))
}

/// Flux divided by its NaN-robust median
pub fn median_normalized(flux: ArrayView1<f64>) -> Result<Array1<f64>, HaloError> {
    let median =
        nanmedian(flux).ok_or(HaloError::DegenerateInput("flux has no finite samples"))?;
    if median.abs() < MIN_MEDIAN {
        return Err(HaloError::DegenerateInput("flux median is zero"));
    }
    Ok(flux.mapv(|v| v / median))
}

/// Halo reconstruction: optimize pixel weights under a smoothness objective,
/// optionally refining the optimum under a second objective
///
/// The two-stage mode reproduces the empirically motivated chain of
/// first-order then second-order total variation: the first stage's optimum
/// seeds the second solve, which generally lands on a different weight
/// vector. It is off by default; single-stage reconstruction is sufficient
/// for correctness.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct HaloReconstructor {
    pub solver: WeightSolver,
    pub smoothness: Smoothness,
    pub refinement: Option<Smoothness>,
}

impl HaloReconstructor {
    pub fn new(solver: WeightSolver, smoothness: Smoothness, refinement: Option<Smoothness>) -> Self {
        Self {
            solver,
            smoothness,
            refinement,
        }
    }

    /// The usual two-stage pipeline: first-order, refined by second-order
    pub fn chained(solver: WeightSolver) -> Self {
        Self::new(
            solver,
            Smoothness::FirstOrder(crate::objective::FirstOrder {}),
            Some(Smoothness::SecondOrder(crate::objective::SecondOrder {})),
        )
    }

    /// Optimize weights for the pixel matrix and extract the weighted light
    /// curve
    pub fn reconstruct(
        &self,
        pixel_vectors: ArrayView2<f64>,
        initial: &[f64],
    ) -> Result<HaloReconstruction, HaloError> {
        let objective = WeightedFluxObjective::new(pixel_vectors, self.smoothness)?;
        let first = self.solver.minimize_weights(&objective, initial)?;

        let (fit, first_stage) = match self.refinement {
            Some(refinement) => {
                let refined_objective = WeightedFluxObjective::new(pixel_vectors, refinement)?;
                let seed = first.weights.to_vec();
                let refined = self.solver.minimize_weights(&refined_objective, &seed)?;
                (refined, Some(first))
            }
            None => (first, None),
        };

        let flux = weighted_light_curve(fit.weights.view(), pixel_vectors)?;
        Ok(HaloReconstruction {
            fit,
            first_stage,
            flux,
        })
    }
}

/// Output of [HaloReconstructor::reconstruct]
#[derive(Clone, Debug)]
pub struct HaloReconstruction {
    /// The final (possibly refined) weight fit
    pub fit: WeightFitResult,
    /// The first-stage fit when a refinement stage ran
    pub first_stage: Option<WeightFitResult>,
    /// Weighted light curve of the final weights, unnormalized
    pub flux: Array1<f64>,
}
