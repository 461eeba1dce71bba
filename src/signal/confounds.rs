use log::{debug, warn};
use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2, Axis};

use super::stats::{detrend, mean_of_squares, percentile};
use crate::config::ConfoundParams;
use crate::error::{CleanError, Result};

/// Singular values below this fraction of the largest one carry no
/// component.
const RANK_TOLERANCE: f64 = 1e-10;

/// Nuisance regressors from the voxels with the highest temporal variance.
///
/// `signals` is `(n_voxels, n_timepoints)`. Each voxel series is optionally
/// detrended, voxels whose mean of squares lies strictly above the
/// `100 - percentile` percentile are kept (or, when ties leave none above
/// it, those at the threshold), and the leading left singular vectors of the
/// kept `time × voxel` matrix are returned as a `(n_timepoints, count)`
/// matrix, strongest first. `count` is clamped to the number of timepoints.
/// Columns past the rank of the kept series are zero.
pub fn high_variance_confounds(signals: ArrayView2<f64>, params: &ConfoundParams) -> Result<Array2<f64>> {
    params.validate()?;

    let (n_voxels, n_t) = signals.dim();
    if n_t == 0 {
        return Err(CleanError::shape("cannot estimate confounds from an empty time axis"));
    }
    if n_voxels == 0 {
        return Err(CleanError::shape("cannot estimate confounds from an empty mask"));
    }

    let mut series = signals.to_owned();
    if params.detrend {
        for row in series.axis_iter_mut(Axis(0)) {
            detrend(row);
        }
    }

    let variances: Vec<f64> = series
        .axis_iter(Axis(0))
        .map(|row| mean_of_squares(&row.to_vec()))
        .collect();
    let threshold = percentile(&variances, 100.0 - params.percentile).unwrap_or(f64::INFINITY);
    let mut selected: Vec<usize> = (0..n_voxels).filter(|&i| variances[i] > threshold).collect();
    if selected.is_empty() {
        selected = (0..n_voxels).filter(|&i| variances[i] >= threshold).collect();
    }
    debug!(
        "high-variance confounds: {} of {} voxels at or above {threshold:.4}",
        selected.len(),
        n_voxels
    );

    let count = params.count.min(n_t);
    if count < params.count {
        debug!("only {n_t} timepoints; returning {count} confounds");
    }
    let mut confounds = Array2::zeros((n_t, count));
    if selected.is_empty() {
        warn!("no voxel series to estimate confounds from; confounds are zero");
        return Ok(confounds);
    }

    let kept = DMatrix::from_fn(n_t, selected.len(), |t, j| series[[selected[j], t]]);
    let svd = kept.svd(true, false);
    let Some(u) = svd.u else {
        return Err(CleanError::shape("singular value decomposition of the confound voxels failed"));
    };
    let values = &svd.singular_values;
    let s_max = values.iter().cloned().fold(0.0, f64::max);
    let mut order: Vec<usize> = (0..values.len())
        .filter(|&i| s_max > 0.0 && values[i] > RANK_TOLERANCE * s_max)
        .collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));

    if order.len() < count {
        warn!(
            "voxel selection supports {} of {count} confounds; remaining columns are zero",
            order.len()
        );
    }
    for (c, &k) in order.iter().take(count).enumerate() {
        for t in 0..n_t {
            confounds[[t, c]] = u[(t, k)];
        }
    }
    Ok(confounds)
}

/// Column-wise join of two `(n_timepoints, k)` matrices.
pub fn append_columns(confounds: &Array2<f64>, extra: &Array2<f64>) -> Result<Array2<f64>> {
    if confounds.nrows() != extra.nrows() {
        return Err(CleanError::shape(format!(
            "regressors have {} rows but the signal has {} timepoints",
            extra.nrows(),
            confounds.nrows()
        )));
    }
    ndarray::concatenate(Axis(1), &[confounds.view(), extra.view()])
        .map_err(|e| CleanError::shape(e.to_string()))
}
