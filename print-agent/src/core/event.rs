//! Agent event bus
//!
//! Every shell-visible happening flows through one broadcast channel:
//! connection lifecycle, printer registration, job lifecycle,
//! info/warning/error lines. Consumers (the headless CLI today, a GUI
//! shell tomorrow) subscribe and render; none of them can block the
//! core because the channel drops for lagging receivers.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::queue::JobProjection;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AgentEvent {
    // Connection lifecycle
    Connected,
    Reconnected { attempt: u32 },
    Disconnected { reason: String },
    Reconnecting { attempt: u32, delay_secs: u64 },
    ReconnectFailed { attempt: u32, error: String },
    AuthFailed { message: String },

    // Printers
    PrinterRegistered { system_name: String },
    PrintersRefreshed { count: usize },

    // Sync
    PendingJobsSynced { count: usize },

    // Job lifecycle
    JobQueued { job: JobProjection },
    JobProcessing { job: JobProjection },
    JobCompleted { job: JobProjection },
    JobFailed { job: JobProjection },
    JobRetrying { job: JobProjection, delay_ms: u64 },
    JobExpired { job: JobProjection },
    JobCancelled { job: JobProjection },
    JobDeduplicated { id: String },

    // Faults that keep the agent running
    QueueError { message: String },
    Warning { message: String },
    Info { message: String },
}

/// Cloneable handle to the agent-wide broadcast bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Dropped silently when nobody listens.
    pub fn emit(&self, event: AgentEvent) {
        tracing::trace!(?event, "event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
