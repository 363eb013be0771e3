//! Spooler submission seam

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use shared::PrinterDescriptor;

use crate::render::{RenderedOutput, ScratchDir};

use super::monitor::SpoolerPoll;

/// Opaque reference to a job accepted by the OS print subsystem.
///
/// `os_job_id` is present only when the platform path exposes one;
/// the monitor adapts either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolerHandle {
    pub os_job_id: Option<u32>,
}

/// Options the driver needs beyond the rendered output itself.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Used to name spool files and spooler documents.
    pub job_id: String,
    pub landscape: bool,
    /// Custom page size for labels, in millimeters.
    pub page_width_mm: Option<f64>,
    pub page_height_mm: Option<f64>,
}

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("spooler rejected job: {0}")]
    Rejected(String),

    #[error("print timed out: {0}")]
    Timeout(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("not supported on this platform: {0}")]
    Unsupported(&'static str),
}

/// Submit a rendered output to a named OS printer.
#[async_trait]
pub trait SpoolerDriver: Send + Sync {
    async fn submit(
        &self,
        output: &RenderedOutput,
        printer: &PrinterDescriptor,
        options: &SubmitOptions,
    ) -> Result<SpoolerHandle, SpoolError>;
}

/// The platform submission strategy, selected at construction.
#[allow(unused_variables)]
pub fn platform_driver(scratch: ScratchDir) -> Arc<dyn SpoolerDriver> {
    #[cfg(unix)]
    return Arc::new(super::driver_unix::LpDriver::new(scratch));
    #[cfg(windows)]
    return Arc::new(super::driver_windows::WindowsDriver::new());
    #[cfg(not(any(unix, windows)))]
    return Arc::new(UnsupportedDriver);
}

/// The platform status poll used by the monitor.
pub fn platform_poll() -> Arc<dyn SpoolerPoll> {
    #[cfg(unix)]
    return Arc::new(super::driver_unix::CupsPoll);
    #[cfg(windows)]
    return Arc::new(super::driver_windows::WindowsPoll);
    #[cfg(not(any(unix, windows)))]
    return Arc::new(UnsupportedPoll);
}

#[cfg(not(any(unix, windows)))]
struct UnsupportedDriver;

#[cfg(not(any(unix, windows)))]
#[async_trait]
impl SpoolerDriver for UnsupportedDriver {
    async fn submit(
        &self,
        _output: &RenderedOutput,
        _printer: &PrinterDescriptor,
        _options: &SubmitOptions,
    ) -> Result<SpoolerHandle, SpoolError> {
        Err(SpoolError::Unsupported("spooler submission"))
    }
}

#[cfg(not(any(unix, windows)))]
struct UnsupportedPoll;

#[cfg(not(any(unix, windows)))]
#[async_trait]
impl SpoolerPoll for UnsupportedPoll {
    async fn job_status(
        &self,
        _printer: &str,
        _os_job_id: u32,
    ) -> Result<super::monitor::OsJobStatus, SpoolError> {
        Err(SpoolError::Unsupported("spooler polling"))
    }
}
