//! Processing steps: file in, file out.
//!
//! Each step has a typed core (`clean`, `modenorm`, `periodogram`) that
//! propagates [`CleanError`](crate::error::CleanError), and a `run_*`
//! boundary that reports failures to an error stream and returns an
//! [`ExitStatus`].

pub mod clean;
pub mod modenorm;
pub mod periodogram;
pub mod report;

pub use clean::{clean, run_clean, CleanReport};
pub use modenorm::{modenorm, run_modenorm};
pub use periodogram::{periodogram, run_periodogram};
pub use report::{ExitStatus, Progress};
