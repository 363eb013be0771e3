//! Durable print job queue
//!
//! The queue is the arbiter of execution: at most one job per printer
//! runs at a time, distinct printers run in parallel, retries follow a
//! fixed backoff ladder and every mutation is persisted (debounced)
//! to an atomically-replaced JSON snapshot.

mod entry;
mod persist;
#[allow(clippy::module_inception)]
mod queue;

pub use entry::{
    JobProjection, JobStatus, QueueEntry, QueueMetrics, QueueStats, DEFAULT_MAX_RETRIES,
};
pub use persist::{PersistError, QueueFile, QueueStore};
pub use queue::{EnqueueOptions, JobExecutor, JobQueue, QueueConfig};
