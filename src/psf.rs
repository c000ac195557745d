//! Point-spread-function rendering on a pixel grid

use crate::error::HaloError;

use ndarray::Array2;

/// Frames whose raw Gaussian sum falls below this floor are returned
/// unnormalized: dividing by a vanishing sum would blow the frame up to
/// meaningless magnitudes for centroids far outside the grid.
const MIN_PSF_SUM: f64 = 1e-12;

/// Render an isotropic Gaussian PSF frame
///
/// Pixel `(i, j)` receives `exp(-((i - x0)^2 + (j - y0)^2) / (2 width^2))`,
/// and the frame is normalized to unit total intensity whenever enough of the
/// profile lands on the grid. The centroid may lie outside the grid; the
/// result is then a valid, finite, possibly near-zero frame, and callers must
/// not assume unit sum.
///
/// # Arguments
/// - `shape`: grid dimensions `(nx, ny)`
/// - `x0`, `y0`: centroid position in pixel coordinates
/// - `width`: Gaussian sigma in pixels, must be positive and finite
pub fn gaussian_psf(
    shape: (usize, usize),
    x0: f64,
    y0: f64,
    width: f64,
) -> Result<Array2<f64>, HaloError> {
    if !(width.is_finite() && width > 0.0) {
        return Err(HaloError::InvalidPsfWidth(width));
    }
    let (nx, ny) = shape;
    if nx == 0 || ny == 0 {
        return Err(HaloError::EmptyGrid { nx, ny });
    }

    let inv_two_width2 = 0.5 / (width * width);
    let mut frame = Array2::from_shape_fn((nx, ny), |(i, j)| {
        let dx = i as f64 - x0;
        let dy = j as f64 - y0;
        (-(dx * dx + dy * dy) * inv_two_width2).exp()
    });

    let sum = frame.sum();
    if sum > MIN_PSF_SUM {
        frame /= sum;
    }
    Ok(frame)
}
