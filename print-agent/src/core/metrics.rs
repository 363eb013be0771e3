//! Agent-level metrics
//!
//! Counters the shell displays and the status line logs. Cheap atomic
//! increments; a snapshot is taken on demand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use shared::util::now_millis;

#[derive(Debug)]
struct Inner {
    started_at: i64,
    reconnections: AtomicU64,
    jobs_received: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    pending_jobs_synced: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct AgentMetrics {
    inner: Arc<Inner>,
}

impl AgentMetrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                started_at: now_millis(),
                reconnections: AtomicU64::new(0),
                jobs_received: AtomicU64::new(0),
                jobs_completed: AtomicU64::new(0),
                jobs_failed: AtomicU64::new(0),
                pending_jobs_synced: AtomicU64::new(0),
            }),
        }
    }

    pub fn record_reconnection(&self) {
        self.inner.reconnections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_received(&self) {
        self.inner.jobs_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_completed(&self) {
        self.inner.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_failed(&self) {
        self.inner.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pending_synced(&self, count: u64) {
        self.inner
            .pending_jobs_synced
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let completed = self.inner.jobs_completed.load(Ordering::Relaxed);
        let failed = self.inner.jobs_failed.load(Ordering::Relaxed);
        let finished = completed + failed;
        MetricsSnapshot {
            started_at: self.inner.started_at,
            uptime_secs: (now_millis() - self.inner.started_at) / 1000,
            reconnections: self.inner.reconnections.load(Ordering::Relaxed),
            jobs_received: self.inner.jobs_received.load(Ordering::Relaxed),
            jobs_completed: completed,
            jobs_failed: failed,
            pending_jobs_synced: self.inner.pending_jobs_synced.load(Ordering::Relaxed),
            success_rate: if finished == 0 {
                1.0
            } else {
                completed as f64 / finished as f64
            },
        }
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub started_at: i64,
    pub uptime_secs: i64,
    pub reconnections: u64,
    pub jobs_received: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub pending_jobs_synced: u64,
    pub success_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let m = AgentMetrics::new();
        assert_eq!(m.snapshot().success_rate, 1.0);

        m.record_job_completed();
        m.record_job_completed();
        m.record_job_completed();
        m.record_job_failed();

        let snap = m.snapshot();
        assert_eq!(snap.jobs_completed, 3);
        assert_eq!(snap.jobs_failed, 1);
        assert!((snap.success_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_counters() {
        let m = AgentMetrics::new();
        m.record_reconnection();
        m.record_job_received();
        m.record_pending_synced(4);

        let snap = m.snapshot();
        assert_eq!(snap.reconnections, 1);
        assert_eq!(snap.jobs_received, 1);
        assert_eq!(snap.pending_jobs_synced, 4);
    }
}
