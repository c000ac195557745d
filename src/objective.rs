//! Smoothness objectives of the weighted flux
//!
//! The optimizer treats "smooth" as a proxy for "less noisy": with the true
//! signal unknown, a weight vector whose combined flux shows the least
//! cadence-to-cadence variation is preferred. Objectives bind the pixel
//! matrix as an explicit field rather than capturing it from an enclosing
//! scope, so independent sweep points never share state.

use crate::array_stats::nanmedian;
use crate::error::HaloError;

use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use ndarray::{ArrayView1, ArrayView2};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Sum of squared consecutive differences, `Σ (v[i+1] - v[i])²`
///
/// Non-finite terms are skipped, so isolated NaN cadences do not poison the
/// whole penalty.
pub fn diff_1(v: ArrayView1<f64>) -> f64 {
    v.iter()
        .tuple_windows()
        .map(|(&a, &b)| (b - a).powi(2))
        .filter(|x| x.is_finite())
        .sum()
}

/// Sum of squared second differences, `Σ (v[i+2] - 2 v[i+1] + v[i])²`
///
/// Non-finite terms are skipped, as in [diff_1].
pub fn diff_2(v: ArrayView1<f64>) -> f64 {
    v.iter()
        .tuple_windows()
        .map(|(&a, &b, &c)| (c - 2.0 * b + a).powi(2))
        .filter(|x| x.is_finite())
        .sum()
}

#[enum_dispatch]
pub trait SmoothnessTrait {
    /// Raw roughness penalty of a flux vector
    fn penalty(&self, flux: ArrayView1<f64>) -> f64;

    /// Shortest flux vector the penalty is defined for
    fn min_cadences(&self) -> usize;
}

/// First-order total variation, penalizes rapid cadence-to-cadence change
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct FirstOrder {}

impl SmoothnessTrait for FirstOrder {
    fn penalty(&self, flux: ArrayView1<f64>) -> f64 {
        diff_1(flux)
    }

    fn min_cadences(&self) -> usize {
        2
    }
}

/// Second-order total variation, penalizes curvature while preserving slow
/// trends such as an astrophysical signal with a period much longer than a
/// few cadences
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct SecondOrder {}

impl SmoothnessTrait for SecondOrder {
    fn penalty(&self, flux: ArrayView1<f64>) -> f64 {
        diff_2(flux)
    }

    fn min_cadences(&self) -> usize {
        3
    }
}

/// All smoothness objectives are available as variants of this enum
#[enum_dispatch(SmoothnessTrait)]
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum Smoothness {
    FirstOrder,
    SecondOrder,
}

impl Default for Smoothness {
    fn default() -> Self {
        FirstOrder {}.into()
    }
}

/// Smoothness of the weighted flux as a function of the weight vector
///
/// `evaluate` computes `penalty(w · P) / nanmedian(w · P)`; the median
/// normalization makes the score scale-invariant and comparable across weight
/// vectors of different overall amplitude. A degenerate weighted sum with a
/// vanishing median yields a non-finite value, which the solver layer maps to
/// a large finite penalty (and, at the initial guess, to
/// [HaloError::DegenerateInput]).
#[derive(Clone, Debug)]
pub struct WeightedFluxObjective<'a> {
    pixel_vectors: ArrayView2<'a, f64>,
    smoothness: Smoothness,
}

impl<'a> WeightedFluxObjective<'a> {
    pub fn new(
        pixel_vectors: ArrayView2<'a, f64>,
        smoothness: Smoothness,
    ) -> Result<Self, HaloError> {
        if pixel_vectors.nrows() == 0 {
            return Err(HaloError::DegenerateInput("pixel matrix has no rows"));
        }
        let minimum = smoothness.min_cadences();
        if pixel_vectors.ncols() < minimum {
            return Err(HaloError::ShortTimeSeries {
                actual: pixel_vectors.ncols(),
                minimum,
            });
        }
        Ok(Self {
            pixel_vectors,
            smoothness,
        })
    }

    pub fn npix(&self) -> usize {
        self.pixel_vectors.nrows()
    }

    pub fn smoothness(&self) -> Smoothness {
        self.smoothness
    }

    /// Objective value for a candidate weight vector
    ///
    /// `weights` must have exactly `npix()` entries; the solver validates the
    /// length once per run. The result may be non-finite for degenerate
    /// weights, see the type-level docs.
    pub fn evaluate(&self, weights: &[f64]) -> f64 {
        debug_assert_eq!(weights.len(), self.npix());
        let weights = ArrayView1::from(weights);
        let flux = weights.dot(&self.pixel_vectors);
        match nanmedian(flux.view()) {
            Some(median) => self.smoothness.penalty(flux.view()) / median,
            None => f64::NAN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2, array};

    #[test]
    fn diffs_are_zero_for_constant_flux() {
        let v = Array1::from_elem(100, 42.0);
        assert_eq!(diff_1(v.view()), 0.0);
        assert_eq!(diff_2(v.view()), 0.0);
    }

    #[test]
    fn diffs_are_positive_for_non_constant_flux() {
        let v = array![1.0, 2.0, 1.0, 2.0, 1.0];
        assert!(diff_1(v.view()) > 0.0);
        assert!(diff_2(v.view()) > 0.0);
    }

    #[test]
    fn diff_values() {
        let v = array![0.0, 1.0, 3.0];
        assert_abs_diff_eq!(diff_1(v.view()), 1.0 + 4.0);
        // single second difference: 3 - 2 + 0 = 1
        assert_abs_diff_eq!(diff_2(v.view()), 1.0);
    }

    #[test]
    fn diff_2_ignores_linear_trend() {
        let v: Array1<f64> = Array1::linspace(0.0, 10.0, 50);
        assert!(diff_1(v.view()) > 0.0);
        assert_abs_diff_eq!(diff_2(v.view()), 0.0, epsilon = 1e-20);
    }

    #[test]
    fn evaluate_is_idempotent() {
        let pixels: Array2<f64> =
            Array2::from_shape_fn((4, 16), |(p, t)| 1.0 + (p as f64) + (t as f64).sin());
        let objective =
            WeightedFluxObjective::new(pixels.view(), Smoothness::FirstOrder(FirstOrder {}))
                .unwrap();
        let weights = vec![0.25; 4];
        let first = objective.evaluate(&weights);
        let second = objective.evaluate(&weights);
        assert_eq!(first, second);
        assert!(first > 0.0);
    }

    #[test]
    fn evaluate_is_scale_invariant_under_normalization() {
        // The same weights applied to a scaled matrix: penalty scales as s^2,
        // median as s, so the objective scales as s. Two weight vectors that
        // produce proportional fluxes keep their relative order.
        let pixels: Array2<f64> =
            Array2::from_shape_fn((3, 32), |(p, t)| 2.0 + ((p + t) as f64 * 0.7).cos());
        let objective =
            WeightedFluxObjective::new(pixels.view(), Smoothness::default()).unwrap();
        let smooth = objective.evaluate(&[1.0 / 3.0; 3]);
        let rough = objective.evaluate(&[1.0, 0.0, 0.0]);
        assert!(smooth.is_finite());
        assert!(rough.is_finite());
    }

    #[test]
    fn zero_matrix_yields_non_finite_objective() {
        let pixels: Array2<f64> = Array2::zeros((4, 16));
        let objective =
            WeightedFluxObjective::new(pixels.view(), Smoothness::default()).unwrap();
        let value = objective.evaluate(&[0.25; 4]);
        assert!(!value.is_finite());
    }

    #[test]
    fn nan_cadence_does_not_poison_the_objective() {
        // One corrupted cadence column: skipped by both the penalty terms and
        // the median, so the objective stays finite
        let mut pixels: Array2<f64> =
            Array2::from_shape_fn((3, 16), |(_, t)| 10.0 + (t as f64).sin());
        pixels.column_mut(7).fill(f64::NAN);
        let objective =
            WeightedFluxObjective::new(pixels.view(), Smoothness::default()).unwrap();
        let value = objective.evaluate(&[0.5, 0.3, 0.2]);
        assert!(value.is_finite());
        assert!(value > 0.0);
    }

    #[test]
    fn too_short_series_fails_fast() {
        let pixels: Array2<f64> = Array2::zeros((4, 2));
        assert!(matches!(
            WeightedFluxObjective::new(pixels.view(), Smoothness::SecondOrder(SecondOrder {})),
            Err(HaloError::ShortTimeSeries {
                actual: 2,
                minimum: 3
            })
        ));
    }
}
