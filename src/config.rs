use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{CleanError, Result};
use crate::pipeline::{self, ExitStatus};
use crate::signal::CleanOptions;

// ---------------------------------------------------------------------------
// High-variance confound estimation
// ---------------------------------------------------------------------------

/// How nuisance regressors are derived from the noisiest voxels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfoundParams {
    /// Number of components to extract.
    #[serde(alias = "count_of_confounds", alias = "n_confounds")]
    pub count: usize,
    /// Share (in percent) of highest-variance voxels to draw components from.
    pub percentile: f64,
    /// Linearly detrend voxel series before estimation.
    pub detrend: bool,
}

impl Default for ConfoundParams {
    fn default() -> Self {
        Self {
            count: 5,
            percentile: 2.0,
            detrend: true,
        }
    }
}

impl ConfoundParams {
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(CleanError::config("count_of_confounds must be at least 1"));
        }
        if !(self.percentile > 0.0 && self.percentile <= 100.0) {
            return Err(CleanError::config(format!(
                "percentile must be in (0, 100], got {}",
                self.percentile
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Nuisance cleaning
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_filter_order() -> usize {
    5
}

fn default_poly_order() -> usize {
    3
}

/// Parameters of one nuisance-cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanParams {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub mask_path: PathBuf,
    #[serde(default, alias = "confound_param")]
    pub confound_params: ConfoundParams,
    #[serde(default)]
    pub motion_param_path: Option<PathBuf>,
    /// Low-pass cutoff in Hz.
    #[serde(default)]
    pub low_pass: Option<f64>,
    /// High-pass cutoff in Hz.
    #[serde(default)]
    pub high_pass: Option<f64>,
    /// Sampling interval in seconds; taken from the input header when absent.
    #[serde(default, alias = "dt")]
    pub tr: Option<f64>,
    #[serde(default = "default_true")]
    pub standardize: bool,
    #[serde(default = "default_true")]
    pub detrend: bool,
    /// Butterworth order per band edge.
    #[serde(default = "default_filter_order")]
    pub filter_order: usize,
    /// Highest degree of the polynomial drift regressors; 0 disables them.
    #[serde(default = "default_poly_order", alias = "pn_order")]
    pub poly_order: usize,
    /// Spatial smoothing kernel FWHM in mm, applied after reassembly.
    #[serde(default, alias = "fwhm")]
    pub smoothing_fwhm: Option<f64>,
}

impl CleanParams {
    /// Parameters with every optional setting at its default.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        mask_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            mask_path: mask_path.into(),
            confound_params: ConfoundParams::default(),
            motion_param_path: None,
            low_pass: None,
            high_pass: None,
            tr: None,
            standardize: true,
            detrend: true,
            filter_order: default_filter_order(),
            poly_order: default_poly_order(),
            smoothing_fwhm: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.confound_params.validate()?;
        for (name, cutoff) in [("low_pass", self.low_pass), ("high_pass", self.high_pass)] {
            if let Some(f) = cutoff {
                if !(f.is_finite() && f > 0.0) {
                    return Err(CleanError::config(format!("{name} must be positive, got {f}")));
                }
            }
        }
        if let (Some(lp), Some(hp)) = (self.low_pass, self.high_pass) {
            if hp >= lp {
                return Err(CleanError::config(format!(
                    "high_pass ({hp} Hz) must be below low_pass ({lp} Hz)"
                )));
            }
        }
        if let Some(tr) = self.tr {
            if !(tr.is_finite() && tr > 0.0) {
                return Err(CleanError::config(format!("tr must be positive, got {tr}")));
            }
        }
        if self.filter_order == 0 {
            return Err(CleanError::config("filter_order must be at least 1"));
        }
        if let Some(fwhm) = self.smoothing_fwhm {
            if !(fwhm.is_finite() && fwhm > 0.0) {
                return Err(CleanError::config(format!("smoothing_fwhm must be positive, got {fwhm}")));
            }
        }
        Ok(())
    }

    /// Options for the cleaning routine once the effective TR is known.
    pub fn clean_options(&self, tr: Option<f64>) -> CleanOptions {
        CleanOptions {
            detrend: self.detrend,
            standardize: self.standardize,
            low_pass: self.low_pass,
            high_pass: self.high_pass,
            tr,
            filter_order: self.filter_order,
            poly_order: self.poly_order,
        }
    }
}

// ---------------------------------------------------------------------------
// Mode normalization and periodogram
// ---------------------------------------------------------------------------

fn default_mode() -> f64 {
    1000.0
}

/// Scale a series so its in-mask grand mean equals `mode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeNormParams {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default)]
    pub mask_path: Option<PathBuf>,
    #[serde(default = "default_mode")]
    pub mode: f64,
}

fn default_dt() -> f64 {
    2.0
}

fn default_nfft() -> usize {
    100
}

/// Voxel-wise power spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodogramParams {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default)]
    pub mask_path: Option<PathBuf>,
    /// Sampling interval in seconds.
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_nfft")]
    pub nfft: usize,
}

// ---------------------------------------------------------------------------
// Job files
// ---------------------------------------------------------------------------

/// One processing step read from a JSON job file, e.g.
///
/// ```json
/// { "step": "clean", "input_path": "func.nii.gz", "output_path": "clean.nii.gz",
///   "mask_path": "mask.nii.gz", "high_pass": 0.01, "low_pass": 0.1 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Job {
    Clean(CleanParams),
    ModeNormalization(ModeNormParams),
    Periodogram(PeriodogramParams),
}

impl Job {
    pub fn load(path: &Path) -> anyhow::Result<Job> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing job file {}", path.display()))
    }

    /// Run the step, reporting progress to `out` and failures to `err`.
    pub fn run(&self, out: &mut dyn Write, err: &mut dyn Write) -> ExitStatus {
        match self {
            Job::Clean(p) => pipeline::run_clean(p, out, err),
            Job::ModeNormalization(p) => pipeline::run_modenorm(p, out, err),
            Job::Periodogram(p) => pipeline::run_periodogram(p, out, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_job_defaults() {
        let job: Job = serde_json::from_str(
            r#"{"step": "clean", "input_path": "in.nii", "output_path": "out.nii", "mask_path": "m.nii"}"#,
        )
        .unwrap();
        let Job::Clean(p) = job else {
            panic!("expected a clean job");
        };
        assert_eq!(p, CleanParams::new("in.nii", "out.nii", "m.nii"));
        assert_eq!(p.confound_params.count, 5);
        assert_eq!(p.confound_params.percentile, 2.0);
        assert!(p.confound_params.detrend);
        assert!(p.standardize);
        assert_eq!(p.poly_order, 3);
        assert_eq!(p.tr, None);
    }

    #[test]
    fn clean_job_aliases() {
        let job: Job = serde_json::from_str(
            r#"{"step": "clean", "input_path": "a", "output_path": "b", "mask_path": "c",
                "confound_param": {"count_of_confounds": 2}, "dt": 1.5, "fwhm": 4.0, "pn_order": 1}"#,
        )
        .unwrap();
        let Job::Clean(p) = job else {
            panic!("expected a clean job");
        };
        assert_eq!(p.confound_params.count, 2);
        assert_eq!(p.confound_params.percentile, 2.0);
        assert_eq!(p.tr, Some(1.5));
        assert_eq!(p.smoothing_fwhm, Some(4.0));
        assert_eq!(p.poly_order, 1);
        assert_eq!(p.clean_options(None).poly_order, 1);
    }

    #[test]
    fn other_steps_have_defaults() {
        let job: Job =
            serde_json::from_str(r#"{"step": "periodogram", "input_path": "a", "output_path": "b"}"#).unwrap();
        assert!(matches!(job, Job::Periodogram(PeriodogramParams { dt, nfft: 100, .. }) if dt == 2.0));

        let job: Job =
            serde_json::from_str(r#"{"step": "mode_normalization", "input_path": "a", "output_path": "b"}"#)
                .unwrap();
        assert!(matches!(job, Job::ModeNormalization(ModeNormParams { mode, mask_path: None, .. }) if mode == 1000.0));
    }

    #[test]
    fn validation_catches_bad_cutoffs() {
        let mut p = CleanParams::new("a", "b", "c");
        p.low_pass = Some(0.01);
        p.high_pass = Some(0.1);
        assert!(matches!(p.validate(), Err(CleanError::Config(_))));

        p.high_pass = None;
        p.low_pass = Some(-1.0);
        assert!(p.validate().is_err());

        p.low_pass = None;
        p.confound_params.percentile = 150.0;
        assert!(p.validate().is_err());
    }
}
