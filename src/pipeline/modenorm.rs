use std::io::Write;

use log::warn;
use ndarray::s;

use super::report::{report_failure, ExitStatus, Progress};
use crate::config::ModeNormParams;
use crate::data::loader::{load_mask, load_volume};
use crate::data::model::Mask;
use crate::data::writer::save_volume;
use crate::error::{CleanError, Result};

const STEP: &str = "Mode Normalization";

pub fn run_modenorm(params: &ModeNormParams, out: &mut dyn Write, err: &mut dyn Write) -> ExitStatus {
    match modenorm(params, out) {
        Ok(_) => ExitStatus::Success,
        Err(e) => report_failure(err, STEP, e),
    }
}

/// Scale the whole series by one factor so the mean over all in-mask voxels
/// and timepoints equals `params.mode`. Returns the factor applied.
pub fn modenorm(params: &ModeNormParams, out: &mut dyn Write) -> Result<f64> {
    let mut progress = Progress::new(out);
    progress.title(STEP)?;
    progress.item("Input path", params.input_path.display())?;
    progress.item("Output path", params.output_path.display())?;
    if !(params.mode.is_finite() && params.mode > 0.0) {
        return Err(CleanError::config(format!("target mode must be positive, got {}", params.mode)));
    }

    let volume = load_volume(&params.input_path)?;
    let mask = match &params.mask_path {
        Some(path) => {
            progress.item("Mask path", path.display())?;
            load_mask(path)?
        }
        None => {
            progress.line("No mask file was provided.")?;
            warn!(
                "mode normalization without a mask is only reliable on skull-stripped data \
                 where voxels outside the brain are 0"
            );
            Mask::from_nonzero_mean(&volume)
        }
    };
    if mask.shape() != volume.spatial_shape() {
        return Err(CleanError::shape(format!(
            "mask grid {:?} does not match volume grid {:?}",
            mask.shape(),
            volume.spatial_shape()
        )));
    }
    progress.item("Target mode value", params.mode)?;

    let coords = mask.coords();
    let n_values = coords.len() * volume.n_timepoints();
    if n_values == 0 {
        return Err(CleanError::shape("mask selects no voxels"));
    }
    let total: f64 = coords
        .iter()
        .map(|&[x, y, z]| volume.data.slice(s![x, y, z, ..]).sum())
        .sum();
    let grand_mean = total / n_values as f64;
    if grand_mean == 0.0 || !grand_mean.is_finite() {
        return Err(CleanError::config(format!(
            "cannot normalise: in-mask grand mean is {grand_mean}"
        )));
    }

    let factor = params.mode / grand_mean;
    progress.item("Scaling factor", format_args!("{factor:.6}"))?;
    let output = volume.with_data(volume.data.mapv(|v| v * factor));
    save_volume(&params.output_path, &output)?;
    progress.done()?;
    Ok(factor)
}
