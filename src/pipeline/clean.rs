use std::io::Write;
use std::path::PathBuf;

use log::{debug, warn};

use super::report::{report_failure, ExitStatus, Progress};
use crate::config::CleanParams;
use crate::data::loader::{load_mask, load_table, load_volume};
use crate::data::masking::{apply_mask, extract, scatter};
use crate::data::writer::save_volume;
use crate::error::Result;
use crate::signal::{append_columns, clean_signals, gaussian_smooth, high_variance_confounds};

const STEP: &str = "Nuisance Signal Cleaning";

/// What a successful cleaning run did.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanReport {
    pub output_path: PathBuf,
    pub n_voxels: usize,
    pub n_timepoints: usize,
    /// Columns of the final confound matrix (estimated + motion).
    pub n_confounds: usize,
    /// Sampling interval used for filtering, if any was available.
    pub tr: Option<f64>,
}

/// Call boundary: run [`clean`], turning any error into a report on `err`
/// and a failure status.
pub fn run_clean(params: &CleanParams, out: &mut dyn Write, err: &mut dyn Write) -> ExitStatus {
    match clean(params, out) {
        Ok(_) => ExitStatus::Success,
        Err(e) => report_failure(err, STEP, e),
    }
}

/// Remove nuisance signals from a 4D series.
///
/// Load → extract → estimate confounds → merge motion regressors → clean →
/// reassemble → (smooth) → save. The output file is only written once every
/// earlier stage has succeeded.
pub fn clean(params: &CleanParams, out: &mut dyn Write) -> Result<CleanReport> {
    let mut progress = Progress::new(out);
    progress.title(STEP)?;
    progress.item("Input path", params.input_path.display())?;
    progress.item("Output path", params.output_path.display())?;
    progress.item("Mask path", params.mask_path.display())?;
    params.validate()?;

    let volume = load_volume(&params.input_path)?;
    let mask = load_mask(&params.mask_path)?;
    let signal = extract(&volume, &mask)?;
    progress.line(format_args!(
        "Extracted {} voxels × {} timepoints",
        signal.n_voxels(),
        signal.n_timepoints()
    ))?;

    let cp = &params.confound_params;
    progress.line("Estimating high-variance confounds.")?;
    progress.item("- components", cp.count)?;
    progress.item("- percentile", cp.percentile)?;
    progress.item("- detrend", cp.detrend)?;
    let mut confounds = high_variance_confounds(signal.values.view(), cp)?;

    match &params.motion_param_path {
        Some(path) => {
            progress.line("Adding motion regressors to the confound set.")?;
            progress.item("- regressor path", path.display())?;
            let motion = load_table(path)?;
            confounds = append_columns(&confounds, &motion.values)?;
        }
        None => progress.line("No motion regressors.")?,
    }
    debug!("confound matrix {:?}", confounds.dim());

    let tr = params.tr.or_else(|| volume.header_tr());
    match tr {
        Some(tr) => progress.item("Temporal resolution", format_args!("{tr} sec"))?,
        None => progress.line("Temporal resolution unknown.")?,
    }
    if let Some(msg) = missing_tr_warning(params, tr) {
        warn!("{msg}");
    }
    match (params.high_pass, params.low_pass) {
        (Some(hp), Some(lp)) => progress.item("Bandpass filter", format_args!("{hp}-{lp} Hz"))?,
        (Some(hp), None) => progress.item("Highpass filter", format_args!("{hp} Hz"))?,
        (None, Some(lp)) => progress.item("Lowpass filter", format_args!("{lp} Hz"))?,
        (None, None) => progress.line("Skipping temporal filter.")?,
    }
    match params.poly_order {
        0 => progress.line("No polynomial drift regressors.")?,
        order => progress.item("Polynomial order", order)?,
    }
    progress.item("Standardize", params.standardize)?;

    progress.line("Processing...")?;
    let cleaned = clean_signals(
        signal.values.view(),
        Some(confounds.view()),
        &params.clean_options(tr),
    )?;

    let mut data = scatter(&signal.coords, cleaned.view(), volume.spatial_shape())?;
    if let Some(fwhm) = params.smoothing_fwhm {
        progress.line("Performing spatial smoothing.")?;
        progress.item("- FWHM", format_args!("{fwhm} mm"))?;
        gaussian_smooth(&mut data, volume.voxel_sizes(), fwhm)?;
        apply_mask(&mut data, &mask)?;
    }

    let output = volume.with_data(data);
    save_volume(&params.output_path, &output)?;
    progress.done()?;

    Ok(CleanReport {
        output_path: params.output_path.clone(),
        n_voxels: signal.n_voxels(),
        n_timepoints: signal.n_timepoints(),
        n_confounds: confounds.ncols(),
        tr,
    })
}

/// Warning text when a temporal filter is requested but no TR is known.
fn missing_tr_warning(params: &CleanParams, tr: Option<f64>) -> Option<String> {
    let filtering = params.low_pass.is_some() || params.high_pass.is_some();
    (filtering && tr.is_none()).then(|| {
        format!(
            "{}: temporal filter requested but no TR given and none in the header",
            params.input_path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tr_only_matters_when_filtering() {
        let mut params = CleanParams::new("func.nii", "out.nii", "mask.nii");
        assert_eq!(missing_tr_warning(&params, None), None);

        params.high_pass = Some(0.01);
        assert!(missing_tr_warning(&params, None).unwrap().contains("func.nii"));
        assert_eq!(missing_tr_warning(&params, Some(2.0)), None);
    }
}
