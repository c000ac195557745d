//! Synthetic centroid trajectories and toy light curves
//!
//! Real missions provide centroid series measured from archival pixel files;
//! these generators stand in for them in simulation runs and tests.

use crate::scene::Trajectory;

use ndarray::{Array1, ArrayView1};
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::TAU;
use std::ops::Range;

/// Regular cadence time axis spanning `[0, span]`
pub fn time_axis(ncad: usize, span: f64) -> Array1<f64> {
    Array1::linspace(0.0, span, ncad)
}

/// Independent Gaussian pointing jitter of the given amplitude per axis
pub fn gaussian_jitter(ncad: usize, sigma: f64, rng: &mut impl Rng) -> Trajectory {
    let mut randn = |_| {
        let eps: f64 = rng.sample(StandardNormal);
        sigma * eps
    };
    let x = Array1::from_shape_fn(ncad, &mut randn);
    let y = Array1::from_shape_fn(ncad, &mut randn);
    Trajectory { x, y }
}

/// Smooth circular pointing drift: `x = A sin(2πt/P)`, `y = A cos(2πt/P)`
pub fn circular(t: ArrayView1<f64>, amplitude: f64, period: f64) -> Trajectory {
    let x = t.mapv(|ti| amplitude * (TAU * ti / period).sin());
    let y = t.mapv(|ti| amplitude * (TAU * ti / period).cos());
    Trajectory { x, y }
}

/// Random-walk pointing drift with Gaussian steps of the given size
pub fn random_walk(ncad: usize, step_sigma: f64, rng: &mut impl Rng) -> Trajectory {
    let mut walk = |_| {
        let mut position = 0.0;
        Array1::from_shape_fn(ncad, |_| {
            let step: f64 = rng.sample(StandardNormal);
            position += step_sigma * step;
            position
        })
    };
    let x = walk(());
    let y = walk(());
    Trajectory { x, y }
}

/// Constant truth flux
pub fn constant_flux(ncad: usize, level: f64) -> Array1<f64> {
    Array1::from_elem(ncad, level)
}

/// Baseline flux with a slow sinusoidal modulation, `baseline + sin(t / timescale)`
pub fn modulated_flux(t: ArrayView1<f64>, baseline: f64, timescale: f64) -> Array1<f64> {
    t.mapv(|ti| baseline + (ti / timescale).sin())
}

/// Multiply the flux by `1 - depth` over a cadence range, a box-shaped toy
/// transit
pub fn inject_transit(flux: &mut Array1<f64>, cadences: Range<usize>, depth: f64) {
    let end = cadences.end.min(flux.len());
    for i in cadences.start..end {
        flux[i] *= 1.0 - depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn time_axis_spans_range() {
        let t = time_axis(101, 100.0);
        assert_eq!(t.len(), 101);
        assert_abs_diff_eq!(t[0], 0.0);
        assert_abs_diff_eq!(t[100], 100.0);
    }

    #[test]
    fn gaussian_jitter_scales_with_sigma() {
        let mut rng = StdRng::seed_from_u64(0);
        let small = gaussian_jitter(2000, 0.1, &mut rng);
        let mut rng = StdRng::seed_from_u64(0);
        let large = gaussian_jitter(2000, 2.0, &mut rng);
        let spread = |tr: &Trajectory| tr.x().mapv(f64::abs).mean().unwrap();
        assert!(spread(&large) > 10.0 * spread(&small));
    }

    #[test]
    fn circular_trajectory_has_unit_radius() {
        let t = time_axis(100, 100.0);
        let trajectory = circular(t.view(), 1.5, TAU);
        for (x, y) in trajectory.x().iter().zip(trajectory.y().iter()) {
            assert_abs_diff_eq!(x * x + y * y, 1.5 * 1.5, epsilon = 1e-10);
        }
    }

    #[test]
    fn transit_only_touches_its_range() {
        let mut flux = constant_flux(100, 20.0);
        inject_transit(&mut flux, 40..60, 0.01);
        for (i, &f) in flux.iter().enumerate() {
            if (40..60).contains(&i) {
                assert_abs_diff_eq!(f, 20.0 * 0.99, epsilon = 1e-12);
            } else {
                assert_abs_diff_eq!(f, 20.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn transit_range_is_clamped() {
        let mut flux = constant_flux(10, 1.0);
        inject_transit(&mut flux, 8..20, 0.5);
        assert_abs_diff_eq!(flux[9], 0.5, epsilon = 1e-12);
    }
}
