//! Numerical routines over voxel time series and volumes.
//!
//! Matrices follow the data layer's convention: signals are
//! `(n_voxels, n_timepoints)`, confounds are `(n_timepoints, k)`.

pub mod butterworth;
pub mod confounds;
pub mod regression;
pub mod smoothing;
pub mod spectral;
pub mod stats;

pub use butterworth::{Band, ButterworthFilter};
pub use confounds::{append_columns, high_variance_confounds};
pub use regression::{clean_signals, CleanOptions};
pub use smoothing::gaussian_smooth;
pub use spectral::Periodogram;
