//! Logging setup
//!
//! tracing-subscriber fmt layer with env-controlled level; optional
//! daily-rolling file output in the data directory.

use std::path::Path;

/// Initialize the global subscriber.
///
/// `level` falls back to `info` when unparseable. When `log_dir`
/// exists, output goes to a daily-rolling file there instead of
/// stdout. `json` switches to line-JSON output for log shippers.
pub fn init(level: &str, json: bool, log_dir: Option<&Path>) {
    let max_level = level.parse().unwrap_or(tracing::Level::INFO);

    let builder = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if let Some(dir) = log_dir {
        if dir.exists() {
            let appender = tracing_appender::rolling::daily(dir, "print-agent");
            if json {
                builder.json().with_writer(appender).init();
            } else {
                builder.with_ansi(false).with_writer(appender).init();
            }
            return;
        }
    }

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
