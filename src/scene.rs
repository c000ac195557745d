//! Synthetic pixel scenes: a point source moving over a sensitivity-weighted
//! grid with additive read noise
//!
//! [PixelCube::synthesize] is the scene synthesizer: for each cadence it
//! renders the PSF at the jittered centroid, scales by the truth flux and the
//! per-pixel sensitivity, and adds independent Gaussian read noise. The cube
//! is immutable once synthesized and also carries its flattened
//! pixel-by-cadence matrix, the form the weight optimizer consumes.

use crate::error::HaloError;
use crate::psf::gaussian_psf;

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, Zip};
use rand::Rng;
use rand::seq::index::sample;
use rand_distr::StandardNormal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Per-cadence centroid offsets about the grid center, in pixels
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    pub(crate) x: Array1<f64>,
    pub(crate) y: Array1<f64>,
}

impl Trajectory {
    pub fn new(x: Array1<f64>, y: Array1<f64>) -> Result<Self, HaloError> {
        if x.len() != y.len() {
            return Err(HaloError::LengthMismatch {
                what: "trajectory y",
                expected: x.len(),
                actual: y.len(),
            });
        }
        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn x(&self) -> ArrayView1<'_, f64> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView1<'_, f64> {
        self.y.view()
    }
}

/// Fixed multiplicative per-pixel efficiency factors in (0, 1]
///
/// Created once per simulation run and immutable thereafter.
#[derive(Clone, Debug, PartialEq)]
pub struct SensitivityMap(Array2<f64>);

impl SensitivityMap {
    /// Perfectly flat map, every pixel at unit efficiency
    pub fn uniform(shape: (usize, usize)) -> Self {
        Self(Array2::ones(shape))
    }

    /// Random map with entries drawn uniformly from `(1 - drop, 1]`
    pub fn random(
        shape: (usize, usize),
        drop: f64,
        rng: &mut impl Rng,
    ) -> Result<Self, HaloError> {
        if !(drop.is_finite() && (0.0..1.0).contains(&drop)) {
            return Err(HaloError::InvalidSensitivityDrop(drop));
        }
        Ok(Self(Array2::from_shape_fn(shape, |_| {
            1.0 - drop * rng.random::<f64>()
        })))
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.0
    }

    pub fn shape(&self) -> (usize, usize) {
        self.0.dim()
    }
}

/// Static description of a synthetic scene
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SceneConfig {
    /// Grid extent along the first pixel axis
    pub nx: usize,
    /// Grid extent along the second pixel axis
    pub ny: usize,
    /// Gaussian PSF sigma in pixels
    pub psf_width: f64,
    /// Standard deviation of the additive per-pixel read noise
    pub white_noise: f64,
}

impl SceneConfig {
    pub fn new(nx: usize, ny: usize, psf_width: f64, white_noise: f64) -> Self {
        Self {
            nx,
            ny,
            psf_width,
            white_noise,
        }
    }

    #[inline]
    pub fn default_nx() -> usize {
        10
    }

    #[inline]
    pub fn default_ny() -> usize {
        10
    }

    #[inline]
    pub fn default_psf_width() -> f64 {
        3.0
    }

    #[inline]
    pub fn default_white_noise() -> f64 {
        0.0
    }

    pub fn npix(&self) -> usize {
        self.nx * self.ny
    }

    /// Grid center in pixel coordinates; trajectories are offsets about it
    pub fn center(&self) -> (f64, f64) {
        ((self.nx as f64 - 1.0) / 2.0, (self.ny as f64 - 1.0) / 2.0)
    }

    pub fn validate(&self) -> Result<(), HaloError> {
        if self.nx == 0 || self.ny == 0 {
            return Err(HaloError::EmptyGrid {
                nx: self.nx,
                ny: self.ny,
            });
        }
        if !(self.psf_width.is_finite() && self.psf_width > 0.0) {
            return Err(HaloError::InvalidPsfWidth(self.psf_width));
        }
        if !(self.white_noise.is_finite() && self.white_noise >= 0.0) {
            return Err(HaloError::InvalidNoiseLevel(self.white_noise));
        }
        Ok(())
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::new(
            Self::default_nx(),
            Self::default_ny(),
            Self::default_psf_width(),
            Self::default_white_noise(),
        )
    }
}

/// Pixel-by-pixel-by-cadence data cube and its flattened matrix form
#[derive(Clone, Debug)]
pub struct PixelCube {
    cube: Array3<f64>,
    pixel_vectors: Array2<f64>,
}

impl PixelCube {
    /// Synthesize the cube for a full observation
    ///
    /// Per cadence `t` and pixel `(i, j)`:
    /// `flux[t] * psf(center + trajectory[t])[i, j] * sensitivity[i, j] +
    /// white_noise * N(0, 1)`.
    ///
    /// Deterministic for a seeded generator. All inputs are validated before
    /// any numerical work: grid and width via [SceneConfig::validate],
    /// trajectory/flux length agreement, strict flux positivity, and the
    /// sensitivity shape.
    pub fn synthesize(
        config: &SceneConfig,
        trajectory: &Trajectory,
        flux: ArrayView1<f64>,
        sensitivity: &SensitivityMap,
        rng: &mut impl Rng,
    ) -> Result<Self, HaloError> {
        config.validate()?;
        let ncad = trajectory.len();
        if ncad == 0 {
            return Err(HaloError::ShortTimeSeries {
                actual: 0,
                minimum: 1,
            });
        }
        if flux.len() != ncad {
            return Err(HaloError::LengthMismatch {
                what: "flux",
                expected: ncad,
                actual: flux.len(),
            });
        }
        for (index, &value) in flux.iter().enumerate() {
            if !(value.is_finite() && value > 0.0) {
                return Err(HaloError::NonPositiveFlux { index, value });
            }
        }
        if sensitivity.shape() != (config.nx, config.ny) {
            return Err(HaloError::LengthMismatch {
                what: "sensitivity map",
                expected: config.npix(),
                actual: sensitivity.as_array().len(),
            });
        }

        let (cx, cy) = config.center();
        let mut cube = Array3::zeros((config.nx, config.ny, ncad));
        for t in 0..ncad {
            let psf = gaussian_psf(
                (config.nx, config.ny),
                cx + trajectory.x[t],
                cy + trajectory.y[t],
                config.psf_width,
            )?;
            let mut frame = cube.index_axis_mut(Axis(2), t);
            Zip::from(&mut frame)
                .and(&psf)
                .and(sensitivity.as_array())
                .for_each(|pixel, &p, &s| {
                    let noise: f64 = rng.sample(StandardNormal);
                    *pixel = flux[t] * p * s + config.white_noise * noise;
                });
        }

        let ny = config.ny;
        let pixel_vectors = Array2::from_shape_fn((config.npix(), ncad), |(pix, t)| {
            cube[[pix / ny, pix % ny, t]]
        });
        Ok(Self {
            cube,
            pixel_vectors,
        })
    }

    pub fn cube(&self) -> &Array3<f64> {
        &self.cube
    }

    /// Matrix with one row per pixel index and one column per cadence
    pub fn pixel_vectors(&self) -> ArrayView2<'_, f64> {
        self.pixel_vectors.view()
    }

    pub fn npix(&self) -> usize {
        self.pixel_vectors.nrows()
    }

    pub fn ncad(&self) -> usize {
        self.pixel_vectors.ncols()
    }

    /// A `(k, ncad)` matrix of `k` distinct randomly chosen pixel rows
    ///
    /// Used by subsampling experiments that reconstruct from a fraction of
    /// the aperture.
    pub fn subsample_pixels(
        &self,
        k: usize,
        rng: &mut impl Rng,
    ) -> Result<Array2<f64>, HaloError> {
        let npix = self.npix();
        if k == 0 {
            return Err(HaloError::DegenerateInput("pixel subsample is empty"));
        }
        if k > npix {
            return Err(HaloError::SubsampleTooLarge {
                requested: k,
                available: npix,
            });
        }
        let mut out = Array2::zeros((k, self.ncad()));
        for (row, pix) in sample(rng, npix, k).into_iter().enumerate() {
            out.row_mut(row).assign(&self.pixel_vectors.row(pix));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    fn still_trajectory(ncad: usize) -> Trajectory {
        Trajectory::new(Array1::zeros(ncad), Array1::zeros(ncad)).unwrap()
    }

    #[test]
    fn noiseless_cube_is_deterministic_and_proportional_to_flux() {
        let config = SceneConfig::default();
        let ncad = 16;
        let flux: Array1<f64> = (1..=ncad).map(|i| i as f64).collect::<Vec<_>>().into();
        let trajectory = still_trajectory(ncad);
        let sensitivity = SensitivityMap::uniform((config.nx, config.ny));

        let mut rng = StdRng::seed_from_u64(7);
        let cube = PixelCube::synthesize(
            &config,
            &trajectory,
            flux.view(),
            &sensitivity,
            &mut rng,
        )
        .unwrap();

        // Unit-sum PSF and unit sensitivity: each cadence column sums to the
        // truth flux
        let pv = cube.pixel_vectors();
        for (t, column) in pv.columns().into_iter().enumerate() {
            assert_abs_diff_eq!(column.sum(), flux[t], epsilon = 1e-10);
        }
    }

    #[test]
    fn seeded_synthesis_reproduces() {
        let config = SceneConfig::new(6, 6, 2.0, 0.5);
        let ncad = 12;
        let flux = Array1::from_elem(ncad, 20.0);
        let trajectory = still_trajectory(ncad);
        let sensitivity = SensitivityMap::uniform((config.nx, config.ny));

        let synth = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            PixelCube::synthesize(&config, &trajectory, flux.view(), &sensitivity, &mut rng)
                .unwrap()
        };
        let a = synth(42);
        let b = synth(42);
        let c = synth(43);
        assert_eq!(a.cube(), b.cube());
        assert_ne!(a.cube(), c.cube());
    }

    #[test]
    fn pixel_vectors_match_cube_layout() {
        let config = SceneConfig::new(3, 4, 1.5, 0.0);
        let ncad = 5;
        let flux = Array1::from_elem(ncad, 10.0);
        let trajectory = still_trajectory(ncad);
        let sensitivity = SensitivityMap::uniform((config.nx, config.ny));
        let mut rng = StdRng::seed_from_u64(0);
        let cube =
            PixelCube::synthesize(&config, &trajectory, flux.view(), &sensitivity, &mut rng)
                .unwrap();

        for i in 0..config.nx {
            for j in 0..config.ny {
                for t in 0..ncad {
                    assert_eq!(
                        cube.cube()[[i, j, t]],
                        cube.pixel_vectors()[[i * config.ny + j, t]]
                    );
                }
            }
        }
    }

    #[test]
    fn validation_fails_fast() {
        let config = SceneConfig::default();
        let sensitivity = SensitivityMap::uniform((config.nx, config.ny));
        let mut rng = StdRng::seed_from_u64(0);

        // mismatched flux length
        let trajectory = still_trajectory(8);
        let flux = Array1::from_elem(7, 1.0);
        assert_eq!(
            PixelCube::synthesize(&config, &trajectory, flux.view(), &sensitivity, &mut rng)
                .unwrap_err(),
            HaloError::LengthMismatch {
                what: "flux",
                expected: 8,
                actual: 7
            }
        );

        // non-positive flux
        let flux = Array1::from(vec![1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(
            PixelCube::synthesize(&config, &trajectory, flux.view(), &sensitivity, &mut rng)
                .unwrap_err(),
            HaloError::NonPositiveFlux {
                index: 1,
                value: 0.0
            }
        );

        // bad width
        let bad = SceneConfig::new(10, 10, -1.0, 0.0);
        let flux = Array1::from_elem(8, 1.0);
        assert_eq!(
            PixelCube::synthesize(&bad, &trajectory, flux.view(), &sensitivity, &mut rng)
                .unwrap_err(),
            HaloError::InvalidPsfWidth(-1.0)
        );
    }

    #[test]
    fn sensitivity_map_entries_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let map = SensitivityMap::random((20, 20), 0.1, &mut rng).unwrap();
        assert!(map.as_array().iter().all(|&s| s > 0.9 && s <= 1.0));

        assert_eq!(
            SensitivityMap::random((2, 2), 1.0, &mut rng),
            Err(HaloError::InvalidSensitivityDrop(1.0))
        );
    }

    #[test]
    fn subsample_selects_existing_rows() {
        let config = SceneConfig::new(4, 4, 1.0, 0.0);
        let ncad = 6;
        let flux = Array1::from_elem(ncad, 5.0);
        let trajectory = still_trajectory(ncad);
        let sensitivity = SensitivityMap::uniform((config.nx, config.ny));
        let mut rng = StdRng::seed_from_u64(1);
        let cube =
            PixelCube::synthesize(&config, &trajectory, flux.view(), &sensitivity, &mut rng)
                .unwrap();

        let sub = cube.subsample_pixels(5, &mut rng).unwrap();
        assert_eq!(sub.dim(), (5, ncad));
        for row in sub.rows() {
            assert!(
                cube.pixel_vectors()
                    .rows()
                    .into_iter()
                    .any(|orig| orig == row)
            );
        }

        assert_eq!(
            cube.subsample_pixels(17, &mut rng),
            Err(HaloError::SubsampleTooLarge {
                requested: 17,
                available: 16
            })
        );
    }
}
