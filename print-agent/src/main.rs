use print_agent::core::config::AgentConfig;
use print_agent::core::config_store::{default_data_dir, ConfigStore};
use print_agent::core::tasks::{BackgroundTasks, TaskKind};
use print_agent::core::{logging, orchestrator};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let data_dir = default_data_dir();
    let store = match ConfigStore::open(&data_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Cannot open data directory {}: {e}", data_dir.display());
            std::process::exit(1);
        }
    };

    // Logging: stdout by default, daily files under <data-dir>/logs
    // when LOG_TO_FILE=true.
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_json = std::env::var("LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);
    let log_to_file = std::env::var("LOG_TO_FILE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);
    let log_dir = data_dir.join("logs");
    if log_to_file {
        let _ = std::fs::create_dir_all(&log_dir);
    }
    logging::init(
        &log_level,
        log_json,
        log_to_file.then_some(log_dir.as_path()),
    );

    let config = AgentConfig::load(&store);
    banner(&config);

    if !config.has_credentials() {
        tracing::warn!(
            "No tenant/client credentials configured; set TENANT_ID and CLIENT_ID (or pair via the backend)"
        );
    }

    let mut tasks = BackgroundTasks::new();
    let state = match orchestrator::start(config, &mut tasks).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Startup failed: {e}");
            std::process::exit(1);
        }
    };

    // Printer list at startup
    {
        let printers = state.printers.read().await;
        tracing::info!("Local printers: {}", printers.len());
        for p in printers.iter() {
            tracing::info!(
                "  {} [{:?}/{:?}]{}",
                p.system_name,
                p.printer_type,
                p.transport,
                if p.metadata.is_default {
                    " (default)"
                } else {
                    ""
                }
            );
        }
    }

    // Periodic status line
    let status_state = state.clone();
    let status_token = tasks.shutdown_token();
    tasks.spawn("status_line", TaskKind::Periodic, async move {
        loop {
            tokio::select! {
                _ = status_token.cancelled() => break,
                _ = tokio::time::sleep(std::time::Duration::from_secs(60)) => {
                    let stats = status_state.queue.get_stats().await;
                    let metrics = status_state.metrics.snapshot();
                    tracing::info!(
                        "[status] connection={:?} queued={} processing={} completed={} failed={} success={:.0}% uptime={}s",
                        status_state.session.state(),
                        stats.queued,
                        stats.processing,
                        stats.completed,
                        stats.failed,
                        metrics.success_rate * 100.0,
                        metrics.uptime_secs,
                    );
                }
            }
        }
    });

    wait_for_shutdown().await;
    tracing::info!("Shutdown signal received, draining...");

    tasks.shutdown().await;
    state.queue.flush().await;

    let metrics = state.metrics.snapshot();
    tracing::info!(
        "Final: received={} completed={} failed={} reconnections={} uptime={}s",
        metrics.jobs_received,
        metrics.jobs_completed,
        metrics.jobs_failed,
        metrics.reconnections,
        metrics.uptime_secs,
    );
}

fn banner(config: &AgentConfig) {
    tracing::info!("╔════════════════════════════════════════════════════════╗");
    tracing::info!("║              REPAIRMIND PRINT AGENT                    ║");
    tracing::info!("╚════════════════════════════════════════════════════════╝");
    tracing::info!("  Environment : {:?}", config.environment);
    tracing::info!("  Backend     : {}", config.backend_url);
    tracing::info!("  Socket      : {}", config.websocket_url);
    tracing::info!("  Data dir    : {}", config.data_dir.display());
    tracing::info!("════════════════════════════════════════════════════════");
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                tracing::error!("Cannot install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
