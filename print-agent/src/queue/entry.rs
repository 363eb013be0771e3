//! Queue entry model and aggregate counters

use serde::{Deserialize, Serialize};
use shared::util::now_millis;
use shared::{JobPriority, PrintJob};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Lifecycle of a queue entry.
///
/// Transitions: queued → processing → (completed | failed | queued for
/// retry); queued → expired on TTL; queued → cancelled by operator.
/// Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Expired,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Expired | Self::Cancelled
        )
    }
}

/// A job wrapped with its scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub job: PrintJob,
    pub status: JobStatus,
    #[serde(default)]
    pub priority: JobPriority,
    /// Mirrored from the job for sort keys; back-filled on load.
    #[serde(default)]
    pub printer_system_name: String,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Epoch millis before which a retried entry is not eligible.
    #[serde(default)]
    pub next_retry_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
    /// Epoch millis; back-filled on load when absent.
    #[serde(default)]
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl QueueEntry {
    pub fn new(job: PrintJob, priority: JobPriority, ttl_ms: i64, max_retries: u32) -> Self {
        let now = now_millis();
        Self {
            printer_system_name: job.printer_system_name.clone(),
            job,
            status: JobStatus::Queued,
            priority,
            retries: 0,
            max_retries,
            next_retry_at: 0,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl_ms,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    pub fn projection(&self) -> JobProjection {
        JobProjection {
            id: self.job.id.clone(),
            printer_system_name: self.printer_system_name.clone(),
            document_type: self.job.document_type.as_str(),
            status: self.status,
            priority: self.priority,
            retries: self.retries,
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Read-only view of an entry, used in events and `get_recent_jobs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProjection {
    pub id: String,
    pub printer_system_name: String,
    pub document_type: &'static str,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Aggregate counters persisted with the queue file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueMetrics {
    pub total_enqueued: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_expired: u64,
    pub total_cancelled: u64,
    pub total_deduplicated: u64,
}

/// Point-in-time queue statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub expired: usize,
    pub cancelled: usize,
    pub active_printers: usize,
    pub metrics: QueueMetrics,
}
