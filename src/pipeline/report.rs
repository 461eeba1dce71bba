use std::fmt::Display;
use std::io::Write;

use log::{error, info};

use crate::error::{CleanError, Result};

const TAG: &str = "[FMRI_CLEAN]";

/// Outcome of a step at its call boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    /// `0` on success, `1` on failure.
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }

    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

/// Progress messages for the operator, written to a caller-provided stream
/// and mirrored to the log.
pub struct Progress<'a> {
    out: &'a mut dyn Write,
}

impl<'a> Progress<'a> {
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out }
    }

    /// Step heading, e.g. `[FMRI_CLEAN] Nuisance Signal Cleaning:`.
    pub fn title(&mut self, title: &str) -> Result<()> {
        info!("{title}");
        writeln!(self.out, "{TAG} {title}:").map_err(CleanError::Message)
    }

    /// One indented progress or parameter line.
    pub fn line(&mut self, msg: impl Display) -> Result<()> {
        let msg = msg.to_string();
        info!("{msg}");
        writeln!(self.out, "  {msg}").map_err(CleanError::Message)
    }

    /// `label : value` parameter echo.
    pub fn item(&mut self, label: &str, value: impl Display) -> Result<()> {
        self.line(format_args!("{label:<20}: {value}"))
    }

    pub fn done(&mut self) -> Result<()> {
        info!("done");
        writeln!(self.out, "Done...").map_err(CleanError::Message)?;
        self.out.flush().map_err(CleanError::Message)
    }
}

/// Write a failure report with the full cause chain to `err` and return
/// [`ExitStatus::Failure`].
pub fn report_failure(err: &mut dyn Write, step: &str, failure: CleanError) -> ExitStatus {
    let failure = anyhow::Error::new(failure).context(format!("{step} failed"));
    error!("{failure:#}");
    // nothing left to report to if the error stream itself is broken
    let _ = writeln!(err, "[ERROR] Failed.");
    let _ = writeln!(err, "{failure:?}");
    let _ = err.flush();
    ExitStatus::Failure
}
