//! Combined differential photometric precision
//!
//! CDPP summarizes the noise floor of a light curve on transit timescales: the
//! flux is median-normalized, a moving-median trend is removed, the residual
//! is boxcar-averaged over one transit duration, and the scatter of the
//! averages is reported in parts per million. Zero for a constant series,
//! monotonically larger for noisier residuals.

use crate::array_stats::{nanmedian, sorted_median};
use crate::error::HaloError;

use itertools::Itertools;
use ndarray::{Array1, ArrayView1, s};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Medians below this are considered degenerate for normalization purposes
const MIN_MEDIAN: f64 = 1e-12;

/// CDPP estimator over a regular cadence
///
/// The defaults follow the Kepler convention of a 13-cadence (6.5 h at long
/// cadence) transit duration.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct CdppEstimator {
    /// Boxcar length in cadences, the timescale the score is quoted for
    pub transit_duration: usize,
    /// Moving-median detrend window in cadences, must be odd and longer than
    /// the boxcar
    pub detrend_window: usize,
}

impl CdppEstimator {
    pub fn new(transit_duration: usize, detrend_window: usize) -> Self {
        assert!(transit_duration >= 1, "transit_duration must be positive");
        assert!(
            detrend_window > transit_duration,
            "detrend_window must exceed transit_duration"
        );
        assert!(detrend_window % 2 == 1, "detrend_window must be odd");
        Self {
            transit_duration,
            detrend_window,
        }
    }

    #[inline]
    pub fn default_transit_duration() -> usize {
        13
    }

    #[inline]
    pub fn default_detrend_window() -> usize {
        101
    }

    /// Noise score of a flux-like series in parts per million
    ///
    /// `t` is the cadence time axis; it must match `flux` in length and be
    /// strictly increasing. The estimator assumes the regular cadence the
    /// scene synthesizer produces; irregular gaps are out of scope.
    pub fn cdpp(&self, t: ArrayView1<f64>, flux: ArrayView1<f64>) -> Result<f64, HaloError> {
        if t.len() != flux.len() {
            return Err(HaloError::LengthMismatch {
                what: "flux",
                expected: t.len(),
                actual: flux.len(),
            });
        }
        let n = flux.len();
        let minimum = self.transit_duration + 1;
        if n < minimum {
            return Err(HaloError::ShortTimeSeries { actual: n, minimum });
        }
        if !t.iter().tuple_windows().all(|(&a, &b)| b > a) {
            return Err(HaloError::UnsortedTimeAxis);
        }

        let median =
            nanmedian(flux).ok_or(HaloError::DegenerateInput("flux has no finite samples"))?;
        if median.abs() < MIN_MEDIAN {
            return Err(HaloError::DegenerateInput("flux median is zero"));
        }
        let normalized = flux.mapv(|v| v / median);

        let detrended = self.detrend(normalized.view());

        // Boxcar over one transit duration, then the scatter of the averages
        let d = self.transit_duration;
        let inv_d = 1.0 / d as f64;
        let smoothed: Array1<f64> = (0..=n - d)
            .map(|i| detrended.slice(s![i..i + d]).sum() * inv_d)
            .collect::<Vec<_>>()
            .into();
        Ok(smoothed.std(1.0) * 1e6)
    }

    /// Residual about a centered moving median; the window is truncated at
    /// the series edges
    fn detrend(&self, normalized: ArrayView1<f64>) -> Array1<f64> {
        let n = normalized.len();
        let half = self.detrend_window / 2;
        let mut scratch = Vec::with_capacity(self.detrend_window);
        Array1::from_shape_fn(n, |i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            scratch.clear();
            scratch.extend(
                normalized
                    .slice(s![lo..hi])
                    .iter()
                    .copied()
                    .filter(|x| x.is_finite()),
            );
            if scratch.is_empty() {
                return f64::NAN;
            }
            scratch.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
            normalized[i] - sorted_median(&scratch)
        })
    }
}

impl Default for CdppEstimator {
    fn default() -> Self {
        Self::new(
            Self::default_transit_duration(),
            Self::default_detrend_window(),
        )
    }
}
