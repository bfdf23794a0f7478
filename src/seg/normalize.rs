//! Percentile-based intensity normalization

use ndarray::{Array2, ArrayView2};

/// Interpolated percentile of an ascending slice, `q` in 0..=100.
///
/// Matches the linear-interpolation convention of numerical packages: the
/// value at fractional rank `q/100 * (n-1)`.
fn percentile_sorted(sorted: &[f32], q: f32) -> f32 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    let frac = rank - lo as f32;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Percentile bounds (lo, hi) of the finite values in a plane.
///
/// A plane without finite values gets (0, 1) so normalization degrades to a
/// constant image instead of propagating NaN.
pub fn percentile_bounds(plane: &ArrayView2<'_, f32>, lo_q: f32, hi_q: f32) -> (f32, f32) {
    let mut values: Vec<f32> = plane.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return (0.0, 1.0);
    }
    values.sort_unstable_by(f32::total_cmp);
    (
        percentile_sorted(&values, lo_q),
        percentile_sorted(&values, hi_q),
    )
}

/// Rescale a plane so the `lo_q` percentile maps to 0 and the `hi_q`
/// percentile to 1. Values outside the percentile range extend past [0, 1];
/// non-finite inputs become 0.
pub fn normalize_plane(plane: &ArrayView2<'_, f32>, lo_q: f32, hi_q: f32) -> Array2<f32> {
    let (lo, hi) = percentile_bounds(plane, lo_q, hi_q);
    // A (near-)constant plane has no contrast to stretch
    let range = (hi - lo).max(f32::EPSILON);
    plane.mapv(|v| if v.is_finite() { (v - lo) / range } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn percentiles_interpolate_linearly() {
        let values = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_sorted(&values, 0.0), 0.0);
        assert_eq!(percentile_sorted(&values, 100.0), 4.0);
        assert_eq!(percentile_sorted(&values, 50.0), 2.0);
        assert!((percentile_sorted(&values, 25.0) - 1.0).abs() < 1e-6);
        assert!((percentile_sorted(&values, 90.0) - 3.6).abs() < 1e-6);
    }

    #[test]
    fn normalization_stretches_to_unit_range() {
        let plane = array![[10.0_f32, 20.0], [30.0, 40.0]];
        let normed = normalize_plane(&plane.view(), 0.0, 100.0);
        assert!((normed[[0, 0]] - 0.0).abs() < 1e-6);
        assert!((normed[[1, 1]] - 1.0).abs() < 1e-6);
        assert!((normed[[0, 1]] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn constant_plane_stays_finite() {
        let plane = Array2::<f32>::from_elem((4, 4), 7.5);
        let normed = normalize_plane(&plane.view(), 1.0, 99.8);
        assert!(normed.iter().all(|v| v.is_finite()));
        assert!(normed.iter().all(|&v| v.abs() < 1e-3));
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let plane = array![[f32::NAN, 0.0], [5.0, 10.0]];
        let (lo, hi) = percentile_bounds(&plane.view(), 0.0, 100.0);
        assert_eq!((lo, hi), (0.0, 10.0));
        let normed = normalize_plane(&plane.view(), 0.0, 100.0);
        assert_eq!(normed[[0, 0]], 0.0);
        assert!((normed[[1, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_of_finite_values_degrades_to_zero() {
        let plane = Array2::<f32>::from_elem((2, 2), f32::INFINITY);
        let normed = normalize_plane(&plane.view(), 1.0, 99.8);
        assert!(normed.iter().all(|&v| v == 0.0));
    }
}
