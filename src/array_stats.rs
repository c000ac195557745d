//! Small statistics helpers shared across the crate

use ndarray::ArrayView1;

/// Median of the finite elements of an array, ignoring NaN and infinities
///
/// Returns [None] when the array contains no finite element. This is the
/// normalization primitive used by the smoothness objectives and light-curve
/// scaling, where a rare degenerate weight vector can produce non-finite flux
/// samples that must not poison the median.
pub fn nanmedian(arr: ArrayView1<f64>) -> Option<f64> {
    let mut finite: Vec<f64> = arr.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
    Some(sorted_median(&finite))
}

/// Median of a sorted non-empty slice, averaging the two central elements for
/// even lengths
pub(crate) fn sorted_median(sorted: &[f64]) -> f64 {
    let i = (sorted.len() - 1) / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[i] + sorted[i + 1])
    } else {
        sorted[i]
    }
}
