use log::debug;
use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2, Axis};

use super::butterworth::ButterworthFilter;
use super::stats::{detrend, legendre_basis, zscore};
use crate::error::{CleanError, Result};

/// Singular values below this fraction of the largest one are treated as
/// rank deficiency in the confound matrix.
const RANK_TOLERANCE: f64 = 1e-10;

/// Options for [`clean_signals`].
#[derive(Debug, Clone, PartialEq)]
pub struct CleanOptions {
    pub detrend: bool,
    pub standardize: bool,
    pub low_pass: Option<f64>,
    pub high_pass: Option<f64>,
    /// Sampling interval in seconds; required when a cutoff is set.
    pub tr: Option<f64>,
    pub filter_order: usize,
    /// Highest degree of the Legendre drift regressors; 0 adds none.
    pub poly_order: usize,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            detrend: true,
            standardize: true,
            low_pass: None,
            high_pass: None,
            tr: None,
            filter_order: 5,
            poly_order: 3,
        }
    }
}

/// Clean voxel time series.
///
/// `signals` is `(n_voxels, n_timepoints)`, `confounds` is
/// `(n_timepoints, k)`. Stages, in order:
/// 1. linear detrend of every signal (if `detrend`)
/// 2. Butterworth filtering of signals and confounds (if a cutoff is set)
/// 3. projection of the signals onto the orthogonal complement of the
///    z-scored confounds and Legendre drift terms up to `poly_order`
/// 4. z-scoring of every signal (if `standardize`)
pub fn clean_signals(
    signals: ArrayView2<f64>,
    confounds: Option<ArrayView2<f64>>,
    opts: &CleanOptions,
) -> Result<Array2<f64>> {
    let n_t = signals.ncols();
    if let Some(c) = &confounds {
        if c.nrows() != n_t {
            return Err(CleanError::shape(format!(
                "confounds have {} timepoints but signals have {n_t}",
                c.nrows()
            )));
        }
    }

    let mut out = signals.to_owned();
    if opts.detrend {
        for row in out.axis_iter_mut(Axis(0)) {
            detrend(row);
        }
    }

    let filter = ButterworthFilter::from_cutoffs(opts.low_pass, opts.high_pass, opts.tr, opts.filter_order)?;
    if let Some(filter) = &filter {
        debug!("filtering {} series of length {n_t}", out.nrows());
        for mut row in out.axis_iter_mut(Axis(0)) {
            filter_lane(filter, row.view_mut());
        }
    }

    let drift = legendre_basis(n_t, opts.poly_order);
    let design = match confounds {
        Some(c) => ndarray::concatenate(Axis(1), &[c.view(), drift.view()])
            .map_err(|e| CleanError::shape(e.to_string()))?,
        None => drift,
    };
    if design.ncols() > 0 {
        let mut design = design;
        if let Some(filter) = &filter {
            for col in design.axis_iter_mut(Axis(1)) {
                filter_lane(filter, col);
            }
        }
        for col in design.axis_iter_mut(Axis(1)) {
            standardize_regressor(col, opts.detrend);
        }
        regress_out(&mut out, &design);
    }

    if opts.standardize {
        for row in out.axis_iter_mut(Axis(0)) {
            zscore(row);
        }
    }
    Ok(out)
}

/// Detrend (optionally) and z-score one regressor. A column with nothing
/// left beyond rounding noise, such as a linear term after detrending, is
/// zeroed so it adds no direction to the basis.
fn standardize_regressor(mut col: ndarray::ArrayViewMut1<f64>, detrend_first: bool) {
    let scale = col.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if detrend_first {
        detrend(col.view_mut());
    }
    let residual = col.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if residual <= RANK_TOLERANCE * scale {
        col.fill(0.0);
        return;
    }
    zscore(col);
}

fn filter_lane(filter: &ButterworthFilter, mut lane: ndarray::ArrayViewMut1<f64>) {
    let mut buf = lane.to_vec();
    filter.filtfilt(&mut buf);
    for (dst, src) in lane.iter_mut().zip(buf) {
        *dst = src;
    }
}

/// Remove from every row of `signals` its least-squares fit on the columns of
/// `confounds`.
fn regress_out(signals: &mut Array2<f64>, confounds: &Array2<f64>) {
    let (n_t, k) = confounds.dim();
    if k == 0 || n_t == 0 {
        return;
    }

    let m = DMatrix::from_fn(n_t, k, |i, j| confounds[[i, j]]);
    let svd = m.svd(true, false);
    let Some(u) = svd.u else { return };
    let s_max = svd.singular_values.iter().cloned().fold(0.0, f64::max);
    if s_max <= 0.0 {
        return;
    }
    let basis: Vec<usize> = svd
        .singular_values
        .iter()
        .enumerate()
        .filter(|(_, &s)| s > RANK_TOLERANCE * s_max)
        .map(|(i, _)| i)
        .collect();
    debug!("regressing out {} of {k} confound directions", basis.len());

    for mut row in signals.axis_iter_mut(Axis(0)) {
        for &b in &basis {
            let col = u.column(b);
            let coef: f64 = row.iter().zip(col.iter()).map(|(y, q)| y * q).sum();
            for (y, q) in row.iter_mut().zip(col.iter()) {
                *y -= coef * q;
            }
        }
    }
}
