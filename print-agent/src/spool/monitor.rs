//! Spooler monitor
//!
//! Polls the OS spooler for a submitted job until a terminal state is
//! reached, mapping raw spooler states to the three reported statuses
//! (printing, completed, failed). Exactly one terminal status is sent
//! per monitoring session.
//!
//! A job vanishing from the spooler is ambiguous: it completed, or it
//! was cancelled. The interpretation keys off what was observed
//! before it disappeared. Having seen PRINTING with no error means
//! done; an error flag means it was likely purged after the error;
//! never having seen PRINTING reads as cancelled before printing. A
//! very fast job can complete between two polls and be misread; the
//! overall timeout completing the session is the counterweight.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::driver::{SpoolError, SpoolerHandle};

/// Raw job state as the platform poll reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsJobStatus {
    /// Queued in the spooler but not yet printing.
    Pending,
    Printing,
    Printed,
    Cancelled,
    Aborted,
    Blocked,
    Error,
    Offline,
    PaperOut,
    /// The job is no longer known to the spooler.
    Missing,
}

/// Status reported to the monitor's consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorStatus {
    Printing { has_error: bool },
    Completed { reason: &'static str },
    Failed { reason: String },
}

impl MonitorStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Platform seam: observe one spooler job's state.
#[async_trait]
pub trait SpoolerPoll: Send + Sync {
    async fn job_status(&self, printer: &str, os_job_id: u32)
        -> Result<OsJobStatus, SpoolError>;
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub timeout: Duration,
    /// Delay before declaring success when no OS job id exists.
    pub completion_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(120),
            completion_delay: Duration::from_millis(500),
        }
    }
}

/// Cancels the monitoring task. No terminal status is emitted after
/// cancellation.
pub struct MonitorHandle {
    cancel: CancellationToken,
}

impl MonitorHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Start monitoring a submitted job; statuses flow through `tx`.
pub fn spawn_monitor(
    poll: Arc<dyn SpoolerPoll>,
    printer: String,
    handle: SpoolerHandle,
    config: MonitorConfig,
    tx: mpsc::UnboundedSender<MonitorStatus>,
) -> MonitorHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        run_monitor(poll, printer, handle, config, tx, token).await;
    });
    MonitorHandle { cancel }
}

async fn run_monitor(
    poll: Arc<dyn SpoolerPoll>,
    printer: String,
    handle: SpoolerHandle,
    config: MonitorConfig,
    tx: mpsc::UnboundedSender<MonitorStatus>,
    cancel: CancellationToken,
) {
    let Some(os_job_id) = handle.os_job_id else {
        // Synchronous submission path: nothing to observe, report
        // success after a short settle delay.
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(config.completion_delay) => {}
        }
        let _ = tx.send(MonitorStatus::Completed {
            reason: "no spooler id, assumed printed",
        });
        return;
    };

    let started = Instant::now();
    let mut saw_printing = false;
    let mut has_error = false;

    loop {
        if started.elapsed() >= config.timeout {
            tracing::warn!(
                printer = %printer,
                os_job_id,
                "Monitor timed out, assuming job completed"
            );
            let _ = tx.send(MonitorStatus::Completed {
                reason: "monitor timeout, assumed printed",
            });
            return;
        }

        match poll.job_status(&printer, os_job_id).await {
            Err(e) => {
                // A failed poll proves nothing; keep going.
                tracing::debug!(printer = %printer, os_job_id, "Poll failed: {e}");
            }
            Ok(status) => match status {
                OsJobStatus::Missing => {
                    let terminal = if saw_printing && !has_error {
                        MonitorStatus::Completed { reason: "printed" }
                    } else if has_error {
                        MonitorStatus::Failed {
                            reason: "likely cancelled after error".into(),
                        }
                    } else {
                        MonitorStatus::Failed {
                            reason: "cancelled before printing".into(),
                        }
                    };
                    let _ = tx.send(terminal);
                    return;
                }
                OsJobStatus::Printed => {
                    let _ = tx.send(MonitorStatus::Completed { reason: "printed" });
                    return;
                }
                OsJobStatus::Cancelled | OsJobStatus::Aborted => {
                    let _ = tx.send(MonitorStatus::Failed {
                        reason: "cancelled by spooler".into(),
                    });
                    return;
                }
                OsJobStatus::Blocked
                | OsJobStatus::Error
                | OsJobStatus::Offline
                | OsJobStatus::PaperOut => {
                    has_error = true;
                    let _ = tx.send(MonitorStatus::Printing { has_error: true });
                }
                OsJobStatus::Printing => {
                    saw_printing = true;
                    has_error = false;
                    let _ = tx.send(MonitorStatus::Printing { has_error: false });
                }
                OsJobStatus::Pending => {}
            },
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}
