//! End-to-end queue scenarios through the public API: a scripted
//! executor stands in for the render/submit/monitor pipeline.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use print_agent::core::event::{AgentEvent, EventBus};
use print_agent::queue::{JobExecutor, JobQueue, JobStatus, QueueConfig, QueueStore};
use shared::PrintJob;

fn receipt_job(id: &str, printer: &str) -> PrintJob {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "printerSystemName": printer,
        "documentType": "receipt",
        "content": {
            "storeName": "S",
            "items": [{"quantity": 1, "description": "X", "price": 9.99}],
            "total": 9.99
        }
    }))
    .unwrap()
}

fn fast_queue(dir: &std::path::Path, events: EventBus) -> JobQueue {
    JobQueue::new(
        QueueConfig {
            retry_delays: vec![Duration::from_millis(10)],
            save_debounce: Duration::from_millis(1),
            ..Default::default()
        },
        QueueStore::new(dir.join("job-queue.json")),
        events,
    )
}

struct CountingExec {
    calls: AtomicU32,
    fail_first: u32,
    error: &'static str,
}

#[async_trait]
impl JobExecutor for CountingExec {
    async fn execute(
        &self,
        _job: &PrintJob,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(self.error.into())
        } else {
            Ok(())
        }
    }
}

/// Happy path: job-queued → job-processing → job-completed, executor
/// invoked exactly once.
#[tokio::test]
async fn test_happy_path_event_order() {
    let dir = tempfile::tempdir().unwrap();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let queue = fast_queue(dir.path(), events);

    let exec = Arc::new(CountingExec {
        calls: AtomicU32::new(0),
        fail_first: 0,
        error: "",
    });
    queue.set_executor(exec.clone()).await;

    assert!(queue
        .enqueue(receipt_job("J1", "TM-T88V"), Default::default())
        .await);

    let mut seen = Vec::new();
    loop {
        match rx.recv().await.unwrap() {
            AgentEvent::JobQueued { job } => seen.push(("queued", job.id.clone())),
            AgentEvent::JobProcessing { job } => seen.push(("processing", job.id.clone())),
            AgentEvent::JobCompleted { job } => {
                seen.push(("completed", job.id.clone()));
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    assert_eq!(
        seen,
        vec![
            ("queued", "J1".to_string()),
            ("processing", "J1".to_string()),
            ("completed", "J1".to_string()),
        ]
    );
    assert_eq!(exec.calls.load(Ordering::SeqCst), 1);
}

/// Transient failure: first attempt fails, job-retrying fires, second
/// attempt succeeds. Total attempts = 2.
#[tokio::test]
async fn test_transient_failure_then_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let queue = fast_queue(dir.path(), events);

    let exec = Arc::new(CountingExec {
        calls: AtomicU32::new(0),
        fail_first: 1,
        error: "thermal printer not connected",
    });
    queue.set_executor(exec.clone()).await;

    queue
        .enqueue(receipt_job("J1", "TM-T88V"), Default::default())
        .await;

    // Drive passes until done; the retry becomes eligible after 10ms.
    let mut saw_retrying = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        tokio::select! {
            event = rx.recv() => match event.unwrap() {
                AgentEvent::JobRetrying { job, .. } => {
                    assert_eq!(job.error.as_deref(), Some("thermal printer not connected"));
                    saw_retrying = true;
                }
                AgentEvent::JobCompleted { job } => {
                    assert_eq!(job.retries, 1);
                    break;
                }
                AgentEvent::JobFailed { .. } => panic!("job should recover"),
                _ => {}
            },
            _ = tokio::time::sleep_until(deadline) => panic!("timed out"),
            _ = tokio::time::sleep(Duration::from_millis(25)) => {
                queue.schedule_pass().await;
            }
        }
    }

    assert!(saw_retrying);
    assert_eq!(exec.calls.load(Ordering::SeqCst), 2);
}

/// Re-delivery after reconnect: the job is already processing, the
/// duplicate enqueue is refused and no second execution happens.
#[tokio::test]
async fn test_idempotent_redelivery_during_execution() {
    let dir = tempfile::tempdir().unwrap();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let queue = fast_queue(dir.path(), events);

    struct GatedExec {
        gate: Arc<Semaphore>,
        calls: AtomicU32,
    }
    #[async_trait]
    impl JobExecutor for GatedExec {
        async fn execute(
            &self,
            _job: &PrintJob,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            Ok(())
        }
    }

    let gate = Arc::new(Semaphore::new(0));
    let exec = Arc::new(GatedExec {
        gate: gate.clone(),
        calls: AtomicU32::new(0),
    });
    queue.set_executor(exec.clone()).await;

    assert!(queue
        .enqueue(receipt_job("J1", "TM-T88V"), Default::default())
        .await);

    // Wait until it is processing, then re-deliver.
    loop {
        if let AgentEvent::JobProcessing { .. } = rx.recv().await.unwrap() {
            break;
        }
    }
    assert!(!queue
        .enqueue(receipt_job("J1", "TM-T88V"), Default::default())
        .await);

    let mut deduplicated = false;
    loop {
        match rx.recv().await.unwrap() {
            AgentEvent::JobDeduplicated { id } => {
                assert_eq!(id, "J1");
                deduplicated = true;
                gate.add_permits(1);
            }
            AgentEvent::JobCompleted { .. } => break,
            _ => {}
        }
    }
    assert!(deduplicated);
    assert_eq!(exec.calls.load(Ordering::SeqCst), 1);
}

/// Unknown printer: the entry is accepted, every attempt fails with
/// "Printer not found", terminal failure after max retries.
#[tokio::test]
async fn test_unknown_printer_exhausts_retries() {
    let dir = tempfile::tempdir().unwrap();
    let events = EventBus::new(64);
    let queue = fast_queue(dir.path(), events);

    let exec = Arc::new(CountingExec {
        calls: AtomicU32::new(0),
        fail_first: u32::MAX,
        error: "Printer not found",
    });
    queue.set_executor(exec.clone()).await;

    assert!(queue
        .enqueue(receipt_job("J1", "GHOST-PRINTER"), Default::default())
        .await);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while queue.get_stats().await.failed == 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "job never failed terminally"
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
        queue.schedule_pass().await;
    }

    let recent = queue.get_recent_jobs(1).await;
    assert_eq!(recent[0].status, JobStatus::Failed);
    assert_eq!(recent[0].error.as_deref(), Some("Printer not found"));
    // initial attempt + 3 retries
    assert_eq!(exec.calls.load(Ordering::SeqCst), 4);
}

/// Crash and reload: non-terminal entries survive, counters survive,
/// in-flight entries are demoted and run again.
#[tokio::test]
async fn test_crash_reload_preserves_nonterminal_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_path_buf();

    {
        let queue = fast_queue(&path, EventBus::new(16));
        // No executor installed: entries stay queued.
        queue
            .enqueue(receipt_job("J1", "P1"), Default::default())
            .await;
        queue
            .enqueue(receipt_job("J2", "P2"), Default::default())
            .await;
        queue.flush().await;
    }

    let reloaded = fast_queue(&path, EventBus::new(16));
    let stats = reloaded.get_stats().await;
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.metrics.total_enqueued, 2);

    let mut ids: Vec<String> = reloaded
        .get_recent_jobs(10)
        .await
        .into_iter()
        .map(|p| p.id)
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["J1", "J2"]);
}
