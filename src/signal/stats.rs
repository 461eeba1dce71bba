use ndarray::{Array2, ArrayViewMut1};

// ---------------------------------------------------------------------------
// Per-series statistics used by the cleaning routines
// ---------------------------------------------------------------------------

/// Remove the least-squares line (offset and slope) from a series.
pub fn detrend(mut series: ArrayViewMut1<f64>) {
    let n = series.len();
    if n == 0 {
        return;
    }
    let mean = series.sum() / n as f64;
    let centre = (n as f64 - 1.0) / 2.0;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, &v) in series.iter().enumerate() {
        let tc = i as f64 - centre;
        sxy += tc * (v - mean);
        sxx += tc * tc;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    for (i, v) in series.iter_mut().enumerate() {
        *v -= mean + slope * (i as f64 - centre);
    }
}

/// Subtract the mean and divide by the population standard deviation.
/// A standard deviation below `f64::EPSILON` is replaced by 1.
pub fn zscore(mut series: ArrayViewMut1<f64>) {
    let n = series.len();
    if n == 0 {
        return;
    }
    let mean = series.sum() / n as f64;
    let var = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let mut std = var.sqrt();
    if std < f64::EPSILON {
        std = 1.0;
    }
    series.mapv_inplace(|v| (v - mean) / std);
}

/// Mean of squares, i.e. variance around zero.
pub fn mean_of_squares(series: &[f64]) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.iter().map(|v| v * v).sum::<f64>() / series.len() as f64
}

/// The `q`-th percentile (0–100) with linear interpolation between order
/// statistics. `None` for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Legendre polynomials of degree `1..=order` sampled on `n` evenly spaced
/// points over `[-1, 1]`, one column per degree.
pub fn legendre_basis(n: usize, order: usize) -> Array2<f64> {
    let mut basis = Array2::zeros((n, order));
    for t in 0..n {
        let x = if n > 1 { 2.0 * t as f64 / (n - 1) as f64 - 1.0 } else { 0.0 };
        let (mut prev, mut cur) = (1.0, x);
        for degree in 1..=order {
            basis[[t, degree - 1]] = cur;
            let k = degree as f64;
            let next = ((2.0 * k + 1.0) * x * cur - k * prev) / (k + 1.0);
            prev = cur;
            cur = next;
        }
    }
    basis
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn detrend_removes_line() {
        let mut s = Array1::from_iter((0..8).map(|i| 3.0 + 0.5 * i as f64));
        detrend(s.view_mut());
        assert!(s.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn detrend_keeps_residual_shape() {
        let mut s = Array1::from(vec![1.0, -1.0, 1.0, -1.0]);
        let before = s.clone();
        detrend(s.view_mut());
        // alternating series has a small slope; residual stays alternating
        for (a, b) in s.iter().zip(before.iter()) {
            assert_eq!(a.signum(), b.signum());
        }
        assert!(s.sum().abs() < 1e-12);
    }

    #[test]
    fn zscore_unit_variance() {
        let mut s = Array1::from(vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        zscore(s.view_mut());
        assert!(s.sum().abs() < 1e-12);
        let var = s.iter().map(|v| v * v).sum::<f64>() / s.len() as f64;
        assert!((var - 1.0).abs() < 1e-12);
        assert!((s[0] + 1.5).abs() < 1e-12);
    }

    #[test]
    fn zscore_constant_series_becomes_zero() {
        let mut s = Array1::from_elem(5, 3.0);
        zscore(s.view_mut());
        assert!(s.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn legendre_columns_match_closed_forms() {
        let b = legendre_basis(5, 3);
        assert_eq!(b.dim(), (5, 3));
        let xs = [-1.0, -0.5, 0.0, 0.5, 1.0];
        for (t, &x) in xs.iter().enumerate() {
            assert!((b[[t, 0]] - x).abs() < 1e-12);
            assert!((b[[t, 1]] - 0.5 * (3.0 * x * x - 1.0)).abs() < 1e-12);
            assert!((b[[t, 2]] - 0.5 * (5.0 * x * x * x - 3.0 * x)).abs() < 1e-12);
        }
        assert_eq!(legendre_basis(4, 0).dim(), (4, 0));
    }

    #[test]
    fn percentile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&v, 0.0), Some(1.0));
        assert_eq!(percentile(&v, 100.0), Some(4.0));
        assert_eq!(percentile(&v, 50.0), Some(2.5));
        assert!((percentile(&v, 98.0).unwrap() - 3.94).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), None);
    }
}
