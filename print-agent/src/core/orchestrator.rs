//! Core orchestrator
//!
//! Wires printers, queue, renderer, spooler and session together and
//! owns the executor installed into the queue. Data flow for a job:
//! session delivers it, the queue schedules it onto an idle printer,
//! the executor renders + submits + monitors, and the terminal status
//! flows back to the backend fire-and-forget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use shared::{DocumentType, PrintJob, PrinterDescriptor};

use crate::queue::{JobExecutor, JobQueue, QueueConfig, QueueStore};
use crate::render::{DocumentRenderer, RenderError, ScratchDir};
use crate::session::{spawn_session, SessionConfig, SessionHandle, SessionSignal};
use crate::spool::{
    platform_driver, platform_poll, spawn_monitor, MonitorConfig, MonitorStatus, SpoolerDriver,
    SpoolerPoll, SubmitOptions,
};

use super::config::AgentConfig;
use super::event::{AgentEvent, EventBus};
use super::metrics::AgentMetrics;
use super::state::AgentState;
use super::tasks::{BackgroundTasks, TaskKind};

/// Outer safety net above the monitor's own 120 s limit.
const MONITOR_SAFETY_TIMEOUT: Duration = Duration::from_secs(150);

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("renderer init failed: {0}")]
    Render(#[from] RenderError),
}

/// Bring the whole agent up. Non-blocking: the session connects (and
/// keeps reconnecting) in the background.
pub async fn start(
    config: AgentConfig,
    tasks: &mut BackgroundTasks,
) -> Result<AgentState, CoreError> {
    let events = EventBus::new(256);
    let metrics = AgentMetrics::new();

    // 1. Enumerate printers. An empty or failing snapshot is not
    //    fatal: jobs for unknown printers fail per attempt and the
    //    snapshot can be refreshed later.
    let printers = match crate::printers::enumerate().await {
        Ok(list) => {
            tracing::info!(count = list.len(), "Local printers enumerated");
            list
        }
        Err(e) => {
            tracing::warn!("Printer enumeration failed: {e}");
            events.emit(AgentEvent::Warning {
                message: format!("printer enumeration failed: {e}"),
            });
            Vec::new()
        }
    };
    let printers = Arc::new(RwLock::new(printers));

    // 2. Queue with persistence + timers.
    let queue = JobQueue::new(
        QueueConfig::default(),
        QueueStore::new(config.queue_file()),
        events.clone(),
    );
    queue.start(tasks);

    // 3. Session worker (auto-connects, reconnects forever).
    let mut session_config = SessionConfig::new(
        config.websocket_url.clone(),
        config.tenant_id.clone(),
        config.client_id.clone(),
        config.token.clone(),
        config.api_key.clone(),
    );
    session_config.heartbeat_interval = Duration::from_secs(config.heartbeat_interval_secs);
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let session = spawn_session(session_config, signal_tx, tasks);

    // 4. Executor: render → submit → monitor.
    let scratch = ScratchDir::new()?;
    let executor = Arc::new(PrintExecutor {
        renderer: DocumentRenderer::new(scratch.clone())?,
        driver: platform_driver(scratch),
        poll: platform_poll(),
        session: session.clone(),
        printers: printers.clone(),
        monitor_config: MonitorConfig::default(),
        safety_timeout: MONITOR_SAFETY_TIMEOUT,
    });
    queue.set_executor(executor).await;

    let state = AgentState {
        config,
        queue,
        session,
        printers,
        events,
        metrics,
    };

    // 5. Session signal loop: first connect registers printers and
    //    pulls pending jobs; every reconnect re-syncs.
    let signal_state = state.clone();
    tasks.spawn("session_signals", TaskKind::Listener, async move {
        signal_loop(signal_state, signal_rx).await;
    });

    // 6. Terminal job outcomes feed the agent metrics.
    let metrics_state = state.clone();
    let token = tasks.shutdown_token();
    tasks.spawn("metrics_listener", TaskKind::Listener, async move {
        metrics_loop(metrics_state, token).await;
    });

    Ok(state)
}

async fn signal_loop(state: AgentState, mut rx: mpsc::UnboundedReceiver<SessionSignal>) {
    while let Some(signal) = rx.recv().await {
        match signal {
            SessionSignal::Connected => {
                state.events.emit(AgentEvent::Connected);
                register_printers(&state).await;
                sync_pending_jobs(&state).await;
            }
            SessionSignal::Reconnected { attempt } => {
                state.metrics.record_reconnection();
                state.events.emit(AgentEvent::Reconnected { attempt });
                // Registrations were replayed by the session itself.
                sync_pending_jobs(&state).await;
            }
            SessionSignal::NewJob(job) => {
                state.metrics.record_job_received();
                state.queue.enqueue(job, Default::default()).await;
            }
            SessionSignal::Disconnected { reason } => {
                state.events.emit(AgentEvent::Disconnected { reason });
            }
            SessionSignal::Reconnecting { attempt, delay } => {
                state.events.emit(AgentEvent::Reconnecting {
                    attempt,
                    delay_secs: delay.as_secs(),
                });
            }
            SessionSignal::ReconnectFailed { attempt, error } => {
                state
                    .events
                    .emit(AgentEvent::ReconnectFailed { attempt, error });
            }
            SessionSignal::AuthFailed { message } => {
                state.events.emit(AgentEvent::AuthFailed { message });
            }
        }
    }
}

/// Register every enumerated printer with the backend. Best effort:
/// one refusal does not block the others.
async fn register_printers(state: &AgentState) {
    if !state.config.auto_register {
        return;
    }
    let printers = state.printers.read().await.clone();
    for printer in printers {
        let name = printer.system_name.clone();
        match state.session.register_printer(printer).await {
            Ok(()) => {
                state
                    .events
                    .emit(AgentEvent::PrinterRegistered { system_name: name });
            }
            Err(e) => {
                tracing::warn!(printer = %name, "Printer registration failed: {e}");
            }
        }
    }
}

/// Pull all pending jobs for this client and enqueue them; the
/// queue's idempotency makes re-delivery harmless.
async fn sync_pending_jobs(state: &AgentState) {
    match state.session.get_all_pending_jobs().await {
        Ok(jobs) => {
            let total = jobs.len();
            let mut enqueued = 0usize;
            for job in jobs {
                if state.queue.enqueue(job, Default::default()).await {
                    enqueued += 1;
                }
            }
            state.metrics.record_pending_synced(enqueued as u64);
            state
                .events
                .emit(AgentEvent::PendingJobsSynced { count: enqueued });
            tracing::info!(total, enqueued, "Pending jobs synced");
        }
        Err(e) => {
            tracing::warn!("Pending job sync failed: {e}");
            state.events.emit(AgentEvent::Warning {
                message: format!("pending job sync failed: {e}"),
            });
        }
    }
}

/// Terminal queue outcomes → agent counters. Attempt-level retries do
/// not count as failures.
async fn metrics_loop(state: AgentState, shutdown: CancellationToken) {
    let mut events = state.events.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Ok(AgentEvent::JobCompleted { .. }) => state.metrics.record_job_completed(),
                Ok(AgentEvent::JobFailed { .. } | AgentEvent::JobExpired { .. }) => {
                    state.metrics.record_job_failed();
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Metrics listener lagged {n} events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// The queue executor: one invocation per attempt.
struct PrintExecutor {
    renderer: DocumentRenderer,
    driver: Arc<dyn SpoolerDriver>,
    poll: Arc<dyn SpoolerPoll>,
    session: SessionHandle,
    printers: Arc<RwLock<Vec<PrinterDescriptor>>>,
    monitor_config: MonitorConfig,
    safety_timeout: Duration,
}

#[async_trait]
impl JobExecutor for PrintExecutor {
    async fn execute(
        &self,
        job: &PrintJob,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let printer = {
            self.printers
                .read()
                .await
                .iter()
                .find(|p| p.system_name == job.printer_system_name)
                .cloned()
        };
        let Some(printer) = printer else {
            return Err("Printer not found".into());
        };

        // The backend learns the job left the queue before we touch
        // the renderer; no ack is awaited.
        self.session.update_job_status(&job.id, "sent", json!({}));

        let output = self.renderer.render(job, &printer).await?;
        let options = submit_options(job);
        let handle = self.driver.submit(&output, &printer, &options).await?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor = spawn_monitor(
            self.poll.clone(),
            printer.system_name.clone(),
            handle,
            self.monitor_config.clone(),
            tx,
        );

        let outcome = tokio::time::timeout(self.safety_timeout, async {
            while let Some(status) = rx.recv().await {
                match status {
                    MonitorStatus::Printing { has_error } => {
                        self.session.update_job_status(
                            &job.id,
                            "printing",
                            json!({ "hasError": has_error }),
                        );
                    }
                    terminal => return Some(terminal),
                }
            }
            None
        })
        .await;

        match outcome {
            Ok(Some(MonitorStatus::Completed { reason })) => {
                self.session
                    .update_job_status(&job.id, "completed", json!({ "reason": reason }));
                Ok(())
            }
            Ok(Some(MonitorStatus::Failed { reason })) => {
                self.session
                    .update_job_status(&job.id, "failed", json!({ "error": reason }));
                Err(reason.into())
            }
            Ok(Some(MonitorStatus::Printing { .. })) => unreachable!("filtered above"),
            Ok(None) | Err(_) => {
                // Safety net above the monitor's own timeout: stop the
                // monitor and assume the job made it out.
                monitor.cancel();
                tracing::warn!(job_id = %job.id, "Monitor safety timeout, assuming completed");
                self.session.update_job_status(
                    &job.id,
                    "completed",
                    json!({ "reason": "safety timeout" }),
                );
                Ok(())
            }
        }
    }
}

fn submit_options(job: &PrintJob) -> SubmitOptions {
    let label_like = matches!(
        job.document_type,
        DocumentType::Label | DocumentType::Barcode | DocumentType::Qrcode
    );
    SubmitOptions {
        job_id: job.id.clone(),
        landscape: label_like,
        page_width_mm: label_like.then(|| job.options.label_width_mm.unwrap_or(62.0)),
        page_height_mm: label_like.then(|| job.options.label_height_mm.unwrap_or(29.0)),
    }
}
