use std::io::Write;

use ndarray::Array2;

use super::report::{report_failure, ExitStatus, Progress};
use crate::config::PeriodogramParams;
use crate::data::loader::{load_mask, load_volume};
use crate::data::masking::{extract, scatter};
use crate::data::model::Mask;
use crate::data::writer::save_volume;
use crate::error::{CleanError, Result};
use crate::signal::Periodogram;

const STEP: &str = "Voxel-wise Periodogram";

/// NIfTI time unit code for Hz.
const UNITS_HZ: u8 = 32;
const UNITS_SPACE_MASK: u8 = 0x07;

pub fn run_periodogram(params: &PeriodogramParams, out: &mut dyn Write, err: &mut dyn Write) -> ExitStatus {
    match periodogram(params, out) {
        Ok(_) => ExitStatus::Success,
        Err(e) => report_failure(err, STEP, e),
    }
}

/// Power spectral density of every in-mask voxel, written as a 4D volume
/// whose fourth axis is frequency. Returns the frequency of each bin.
pub fn periodogram(params: &PeriodogramParams, out: &mut dyn Write) -> Result<Vec<f64>> {
    let mut progress = Progress::new(out);
    progress.title(STEP)?;
    progress.item("Input path", params.input_path.display())?;
    progress.item("Output path", params.output_path.display())?;
    if !(params.dt.is_finite() && params.dt > 0.0) {
        return Err(CleanError::config(format!("dt must be positive, got {}", params.dt)));
    }
    let mut estimator = Periodogram::new(params.nfft, 1.0 / params.dt)?;
    progress.item("Sampling interval", format_args!("{} sec", params.dt))?;
    progress.item("FFT length", params.nfft)?;

    let volume = load_volume(&params.input_path)?;
    let mask = match &params.mask_path {
        Some(path) => {
            progress.item("Mask path", path.display())?;
            load_mask(path)?
        }
        None => {
            progress.line("No mask; using voxels with non-zero mean.")?;
            Mask::from_nonzero_mean(&volume)
        }
    };
    let signal = extract(&volume, &mask)?;

    let mut spectra = Array2::zeros((signal.n_voxels(), estimator.n_bins()));
    for (mut dst, series) in spectra.outer_iter_mut().zip(signal.values.outer_iter()) {
        let psd = estimator.estimate(&series.to_vec());
        dst.assign(&ndarray::ArrayView1::from(&psd));
    }

    let data = scatter(&signal.coords, spectra.view(), volume.spatial_shape())?;
    let mut output = volume.with_data(data);
    output.header.pixdim[4] = estimator.resolution() as f32;
    output.header.xyzt_units = (output.header.xyzt_units & UNITS_SPACE_MASK) | UNITS_HZ;
    save_volume(&params.output_path, &output)?;
    progress.done()?;

    Ok(estimator.frequencies())
}
