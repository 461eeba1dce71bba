//! fMRI nuisance-signal cleaning for NIfTI volumes.
//!
//! The main entry point is [`pipeline::clean`]: estimate high-variance
//! confounds inside a mask, add optional motion regressors, regress them out
//! with optional Butterworth filtering and standardization, and write the
//! cleaned series back in volume space. Mode normalization and a voxel-wise
//! periodogram are provided as companion steps.

pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod signal;

pub use config::{CleanParams, ConfoundParams, Job, ModeNormParams, PeriodogramParams};
pub use error::{CleanError, Result};
pub use pipeline::{CleanReport, ExitStatus};
