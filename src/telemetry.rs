//! Structured event log for the stream loop.
//!
//! Events go to a JSON-lines file, one object per event with an RFC 3339 UTC
//! timestamp. Onsets, silences, timeouts, drops and send failures are logged
//! at INFO/WARN; per-frame classifier events are DEBUG and only kept with
//! `--log-timings`.

use crate::config::AppConfig;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Trace file named by `--trace-log` / `VOXSTREAM_TRACE_LOG`, else the temp dir.
pub fn tracing_log_path(config: &AppConfig) -> PathBuf {
    config
        .trace_log
        .clone()
        .unwrap_or_else(|| env::temp_dir().join("voxstream_trace.jsonl"))
}

/// `None` when tracing is off for this run.
pub fn trace_level(config: &AppConfig) -> Option<Level> {
    if config.no_logs {
        return None;
    }
    match (config.logs, config.log_timings) {
        (_, true) => Some(Level::DEBUG),
        (true, false) => Some(Level::INFO),
        (false, false) => None,
    }
}

/// Install the JSON subscriber once per process. Without a trace level no
/// subscriber is installed and events are discarded.
pub fn init_tracing(config: &AppConfig) {
    let Some(level) = trace_level(config) else {
        return;
    };
    let path = tracing_log_path(config);

    TRACING_INIT.get_or_init(|| {
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(err) => {
                crate::log_debug(&format!(
                    "trace log unavailable at {}: {err}",
                    path.display()
                ));
                return;
            }
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            crate::log_debug("trace subscriber already installed");
        }
    });
}
