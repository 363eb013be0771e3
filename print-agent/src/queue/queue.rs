//! Job queue: idempotent enqueue, per-printer parallelism, retry and TTL
//!
//! Concurrency model: one `Mutex<QueueState>` guards the entry map,
//! the busy-printer set and the scheduling re-entrancy flag. Critical
//! sections never await, so the lock is held only for map surgery.
//! Executors run in spawned tasks; the busy set is what serializes
//! jobs per printer while distinct printers proceed in parallel.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::sync::CancellationToken;

use shared::util::now_millis;
use shared::{JobPriority, PrintJob};

use crate::core::event::{AgentEvent, EventBus};
use crate::core::tasks::{BackgroundTasks, TaskKind};

use super::entry::{JobProjection, JobStatus, QueueEntry, QueueMetrics, QueueStats};
use super::persist::{QueueFile, QueueStore};

/// Queue tuning knobs. The defaults are the production values.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_retries: u32,
    pub retry_delays: Vec<Duration>,
    pub default_ttl: Duration,
    pub schedule_interval: Duration,
    pub expire_interval: Duration,
    pub save_debounce: Duration,
    /// Terminal entries kept before the oldest are trimmed.
    pub history_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: super::entry::DEFAULT_MAX_RETRIES,
            retry_delays: vec![
                Duration::from_secs(5),
                Duration::from_secs(15),
                Duration::from_secs(60),
            ],
            default_ttl: Duration::from_secs(24 * 3600),
            schedule_interval: Duration::from_secs(5),
            expire_interval: Duration::from_secs(60),
            save_debounce: Duration::from_millis(200),
            history_limit: 100,
        }
    }
}

/// Per-enqueue overrides.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: Option<JobPriority>,
    pub ttl: Option<Duration>,
}

/// The pluggable executor the orchestrator installs.
///
/// An `Err` marks the attempt failed; the queue's retry policy decides
/// what happens next. The error's `Display` becomes the entry's error
/// string.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(
        &self,
        job: &PrintJob,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Default)]
struct QueueState {
    entries: HashMap<String, QueueEntry>,
    busy: HashSet<String>,
    /// Re-entrancy guard: one scheduling pass at a time.
    scheduling: bool,
    metrics: QueueMetrics,
}

struct Inner {
    config: QueueConfig,
    store: QueueStore,
    state: Mutex<QueueState>,
    executor: RwLock<Option<Arc<dyn JobExecutor>>>,
    events: EventBus,
    save_notify: Notify,
}

/// Durable, crash-safe, idempotent print job queue.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

impl JobQueue {
    /// Create the queue, loading and normalizing any persisted snapshot.
    pub fn new(config: QueueConfig, store: QueueStore, events: EventBus) -> Self {
        let mut state = QueueState::default();

        if let Some(file) = store.load() {
            let (entries, metrics) = normalize_loaded(file, &config);
            tracing::info!(
                entries = entries.len(),
                "Loaded queue snapshot from {}",
                store.path().display()
            );
            state.entries = entries;
            state.metrics = metrics;
        }

        Self {
            inner: Arc::new(Inner {
                config,
                store,
                state: Mutex::new(state),
                executor: RwLock::new(None),
                events,
                save_notify: Notify::new(),
            }),
        }
    }

    /// Register the executor invoked for each job.
    pub async fn set_executor(&self, executor: Arc<dyn JobExecutor>) {
        *self.inner.executor.write().await = Some(executor);
    }

    /// Start the retry scheduler, the TTL expiration tick and the
    /// debounced saver.
    pub fn start(&self, tasks: &mut BackgroundTasks) {
        let token = tasks.shutdown_token();

        let q = self.clone();
        let t = token.clone();
        tasks.spawn("queue_scheduler", TaskKind::Periodic, async move {
            loop {
                tokio::select! {
                    _ = t.cancelled() => break,
                    _ = tokio::time::sleep(q.inner.config.schedule_interval) => {
                        q.schedule_pass().await;
                    }
                }
            }
        });

        let q = self.clone();
        let t = token.clone();
        tasks.spawn("queue_expiry", TaskKind::Periodic, async move {
            loop {
                tokio::select! {
                    _ = t.cancelled() => break,
                    _ = tokio::time::sleep(q.inner.config.expire_interval) => {
                        q.expire_pass().await;
                    }
                }
            }
        });

        let q = self.clone();
        tasks.spawn("queue_saver", TaskKind::Worker, async move {
            q.saver_loop(token).await;
        });
    }

    /// Enqueue a job.
    ///
    /// Returns false on validation failure or when an entry with the
    /// same id is already queued or processing (a `job-deduplicated`
    /// event fires). A terminal entry with the same id is replaced.
    pub async fn enqueue(&self, job: PrintJob, opts: EnqueueOptions) -> bool {
        if job.printer_system_name.trim().is_empty() {
            self.inner.events.emit(AgentEvent::QueueError {
                message: format!("job {} rejected: missing printerSystemName", job.id),
            });
            return false;
        }

        let priority = opts.priority.unwrap_or_else(|| job.effective_priority());
        let ttl = opts.ttl.unwrap_or(self.inner.config.default_ttl);

        {
            let mut st = self.inner.state.lock().await;

            if let Some(existing) = st.entries.get(&job.id) {
                if !existing.is_terminal() {
                    st.metrics.total_deduplicated += 1;
                    self.inner
                        .events
                        .emit(AgentEvent::JobDeduplicated { id: job.id.clone() });
                    tracing::debug!(job_id = %job.id, "Duplicate enqueue ignored");
                    drop(st);
                    self.schedule_save();
                    return false;
                }
                tracing::debug!(job_id = %job.id, "Replacing terminal entry on re-enqueue");
            }

            let id = job.id.clone();
            let entry = QueueEntry::new(
                job,
                priority,
                ttl.as_millis() as i64,
                self.inner.config.max_retries,
            );
            let projection = entry.projection();
            st.entries.insert(id, entry);
            st.metrics.total_enqueued += 1;
            self.inner
                .events
                .emit(AgentEvent::JobQueued { job: projection });
        }

        self.schedule_save();
        self.schedule_pass().await;
        true
    }

    /// Cancel a queued entry. Refuses entries that are already
    /// processing or terminal.
    pub async fn cancel_job(&self, id: &str) -> bool {
        let cancelled = {
            let mut st = self.inner.state.lock().await;
            match st.entries.get_mut(id) {
                Some(entry) if entry.status == JobStatus::Queued => {
                    entry.status = JobStatus::Cancelled;
                    entry.error = Some("cancelled by operator".into());
                    entry.touch();
                    let projection = entry.projection();
                    st.metrics.total_cancelled += 1;
                    self.inner
                        .events
                        .emit(AgentEvent::JobCancelled { job: projection });
                    true
                }
                _ => false,
            }
        };

        if cancelled {
            self.schedule_save();
        }
        cancelled
    }

    pub async fn get_stats(&self) -> QueueStats {
        let st = self.inner.state.lock().await;
        let mut stats = QueueStats {
            queued: 0,
            processing: 0,
            completed: 0,
            failed: 0,
            expired: 0,
            cancelled: 0,
            active_printers: st.busy.len(),
            metrics: st.metrics.clone(),
        };
        for entry in st.entries.values() {
            match entry.status {
                JobStatus::Queued => stats.queued += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Expired => stats.expired += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    /// Newest entries by `updated_at`.
    pub async fn get_recent_jobs(&self, limit: usize) -> Vec<JobProjection> {
        let st = self.inner.state.lock().await;
        let mut projections: Vec<JobProjection> =
            st.entries.values().map(|e| e.projection()).collect();
        projections.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        projections.truncate(limit);
        projections
    }

    /// Force a synchronous persist (shutdown path).
    pub async fn flush(&self) {
        self.persist_now().await;
    }

    /// One scheduling pass: start every eligible entry whose printer
    /// is idle, priority first, oldest first.
    ///
    /// Returns a boxed future (rather than being a plain `async fn`)
    /// to break the mutual-recursion cycle with `run_job`, which
    /// awaits this directly: without the indirection, the compiler
    /// cannot prove the resulting future is `Send`.
    pub fn schedule_pass(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.schedule_pass_inner())
    }

    async fn schedule_pass_inner(&self) {
        let executor = { self.inner.executor.read().await.clone() };
        let Some(executor) = executor else {
            return;
        };

        let to_start: Vec<PrintJob> = {
            let mut st = self.inner.state.lock().await;
            if st.scheduling {
                return;
            }
            st.scheduling = true;

            let now = now_millis();
            let mut candidates: Vec<(u8, i64, String)> = st
                .entries
                .values()
                .filter(|e| {
                    e.status == JobStatus::Queued
                        && e.next_retry_at <= now
                        && !st.busy.contains(&e.printer_system_name)
                })
                .map(|e| (e.priority.ordinal(), e.created_at, e.job.id.clone()))
                .collect();

            candidates.sort_by(|a, b| match a.0.cmp(&b.0) {
                CmpOrdering::Equal => a.1.cmp(&b.1),
                other => other,
            });

            let mut started = Vec::new();
            for (_, _, id) in candidates {
                let printer = match st.entries.get(&id) {
                    Some(e) => e.printer_system_name.clone(),
                    None => continue,
                };
                if st.busy.contains(&printer) {
                    continue;
                }
                st.busy.insert(printer);

                let entry = st.entries.get_mut(&id).expect("candidate entry exists");
                entry.status = JobStatus::Processing;
                entry.touch();
                let projection = entry.projection();
                started.push(entry.job.clone());
                self.inner
                    .events
                    .emit(AgentEvent::JobProcessing { job: projection });
            }

            st.scheduling = false;
            started
        };

        if to_start.is_empty() {
            return;
        }
        self.schedule_save();

        for job in to_start {
            let queue = self.clone();
            let exec = executor.clone();
            tokio::spawn(async move {
                queue.run_job(exec, job).await;
            });
        }
    }

    async fn run_job(&self, executor: Arc<dyn JobExecutor>, job: PrintJob) {
        tracing::info!(job_id = %job.id, printer = %job.printer_system_name, "Executing job");
        let result = executor.execute(&job).await;

        {
            let mut st = self.inner.state.lock().await;
            st.busy.remove(&job.printer_system_name);

            if let Some(entry) = st.entries.get_mut(&job.id) {
                match result {
                    Ok(()) => {
                        entry.status = JobStatus::Completed;
                        entry.error = None;
                        entry.touch();
                        let projection = entry.projection();
                        st.metrics.total_completed += 1;
                        self.inner
                            .events
                            .emit(AgentEvent::JobCompleted { job: projection });
                    }
                    Err(e) => {
                        let message = e.to_string();
                        if entry.retries < entry.max_retries {
                            entry.retries += 1;
                            let delays = &self.inner.config.retry_delays;
                            let idx = (entry.retries as usize - 1).min(delays.len() - 1);
                            let delay = delays[idx];
                            entry.next_retry_at = now_millis() + delay.as_millis() as i64;
                            entry.status = JobStatus::Queued;
                            entry.error = Some(message.clone());
                            entry.touch();
                            let projection = entry.projection();
                            tracing::warn!(
                                job_id = %job.id,
                                retries = entry.retries,
                                delay_secs = delay.as_secs(),
                                "Job attempt failed, retrying: {message}"
                            );
                            self.inner.events.emit(AgentEvent::JobRetrying {
                                job: projection,
                                delay_ms: delay.as_millis() as u64,
                            });
                        } else {
                            entry.status = JobStatus::Failed;
                            entry.error = Some(message.clone());
                            entry.touch();
                            let projection = entry.projection();
                            st.metrics.total_failed += 1;
                            tracing::error!(job_id = %job.id, "Job failed permanently: {message}");
                            self.inner
                                .events
                                .emit(AgentEvent::JobFailed { job: projection });
                        }
                    }
                }
            }

            trim_history(&mut st, self.inner.config.history_limit);
        }

        self.schedule_save();
        self.schedule_pass().await;
    }

    /// TTL tick: expire queued entries past their deadline.
    pub async fn expire_pass(&self) {
        {
            let mut st = self.inner.state.lock().await;
            let now = now_millis();

            let expired_ids: Vec<String> = st
                .entries
                .values()
                .filter(|e| e.status == JobStatus::Queued && e.expires_at < now)
                .map(|e| e.job.id.clone())
                .collect();

            if expired_ids.is_empty() {
                return;
            }

            for id in expired_ids {
                let entry = st.entries.get_mut(&id).expect("expired entry exists");
                entry.status = JobStatus::Expired;
                entry.error = Some("TTL exceeded".into());
                entry.touch();
                let projection = entry.projection();
                st.metrics.total_expired += 1;
                tracing::warn!(job_id = %id, "Job expired (TTL exceeded)");
                self.inner
                    .events
                    .emit(AgentEvent::JobExpired { job: projection });
            }

            trim_history(&mut st, self.inner.config.history_limit);
        }

        self.schedule_save();
    }

    fn schedule_save(&self) {
        self.inner.save_notify.notify_one();
    }

    async fn saver_loop(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    self.persist_now().await;
                    break;
                }
                _ = self.inner.save_notify.notified() => {
                    tokio::time::sleep(self.inner.config.save_debounce).await;
                    self.persist_now().await;
                }
            }
        }
    }

    async fn persist_now(&self) {
        let file = {
            let st = self.inner.state.lock().await;
            QueueFile {
                jobs: st.entries.values().cloned().collect(),
                metrics: st.metrics.clone(),
                saved_at: now_millis(),
            }
        };

        if let Err(e) = self.inner.store.save(&file) {
            tracing::error!("Failed to persist queue: {e}");
            self.inner.events.emit(AgentEvent::QueueError {
                message: format!("queue persistence failed: {e}"),
            });
        }
    }
}

fn trim_history(st: &mut QueueState, limit: usize) {
    let mut terminal: Vec<(i64, String)> = st
        .entries
        .values()
        .filter(|e| e.is_terminal())
        .map(|e| (e.updated_at, e.job.id.clone()))
        .collect();

    if terminal.len() <= limit {
        return;
    }

    terminal.sort_by_key(|(updated_at, _)| *updated_at);
    let excess = terminal.len() - limit;
    for (_, id) in terminal.into_iter().take(excess) {
        st.entries.remove(&id);
    }
}

/// Crash-recovery normalization applied to a loaded snapshot:
/// demote processing entries, back-fill missing fields, expire stale
/// queued entries before the scheduler ever sees them.
fn normalize_loaded(
    file: QueueFile,
    config: &QueueConfig,
) -> (HashMap<String, QueueEntry>, QueueMetrics) {
    let now = now_millis();
    let mut metrics = file.metrics;
    let mut entries = HashMap::with_capacity(file.jobs.len());

    for mut entry in file.jobs {
        // Interrupted mid-execution: the attempt outcome is unknown,
        // run it again.
        if entry.status == JobStatus::Processing {
            tracing::info!(job_id = %entry.job.id, "Demoting processing entry after restart");
            entry.status = JobStatus::Queued;
            entry.touch();
        }

        if entry.printer_system_name.is_empty() {
            entry.printer_system_name = entry.job.printer_system_name.clone();
        }
        if entry.expires_at == 0 {
            entry.expires_at = entry.created_at + config.default_ttl.as_millis() as i64;
        }

        if entry.status == JobStatus::Queued && entry.expires_at < now {
            entry.status = JobStatus::Expired;
            entry.error = Some("TTL exceeded".into());
            entry.touch();
            metrics.total_expired += 1;
        }

        entries.insert(entry.job.id.clone(), entry);
    }

    (entries, metrics)
}
