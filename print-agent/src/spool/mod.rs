//! OS spooler integration
//!
//! Submission and monitoring are split behind two seams: a
//! [`SpoolerDriver`] chosen at construction per platform (CUPS `lp`
//! on Unix, RAW datatype / shell PrintTo on Windows), and a
//! [`SpoolerPoll`] the monitor uses to observe job state. The monitor
//! itself is platform-agnostic and fully testable with a scripted
//! poll.

mod driver;
mod monitor;

#[cfg(unix)]
mod driver_unix;
#[cfg(windows)]
mod driver_windows;

pub use driver::{platform_driver, platform_poll, SpoolError, SpoolerDriver, SpoolerHandle, SubmitOptions};
pub use monitor::{
    spawn_monitor, MonitorConfig, MonitorHandle, MonitorStatus, OsJobStatus, SpoolerPoll,
};
