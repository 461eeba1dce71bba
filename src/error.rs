use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Library error type
// ---------------------------------------------------------------------------

/// Every failure a processing step can hit, grouped by cause.
///
/// I/O problems (`Io`, `Nifti`, `Table`) come from missing or corrupt files,
/// `Shape` from grids or time axes that do not line up, and `Config` from
/// parameters that cannot drive the requested operation.
#[derive(Debug, Error)]
pub enum CleanError {
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read or write NIfTI file {path}")]
    Nifti {
        path: PathBuf,
        #[source]
        source: nifti::NiftiError,
    },

    #[error("failed to load regressor table {path}")]
    Table {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to write progress message")]
    Message(#[source] std::io::Error),
}

pub type Result<T, E = CleanError> = std::result::Result<T, E>;

impl CleanError {
    pub fn shape(msg: impl Into<String>) -> Self {
        CleanError::Shape(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        CleanError::Config(msg.into())
    }
}
