//! Logging infrastructure
//!
//! Local diagnostics (missing context, uninitialized transport, invalid log
//! rate) are emitted through `tracing`. This module installs a subscriber for
//! them; the telemetry backend never sees these records.
//!
//! File logs are written to `~/.local/state/splunk-monitoring/splunk-monitoring.log`
//! by [`init`]; dry runs and `status` only log to stderr.

use crate::config::{Config, LoggingConfig};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// File name of the diagnostics log inside the state directory
pub const LOG_FILE_NAME: &str = "splunk-monitoring.log";

/// Initialize file and stderr logging
///
/// Sets up tracing with:
/// - File output to `$XDG_STATE_HOME/splunk-monitoring/splunk-monitoring.log`
/// - A stderr layer for the same records
/// - Configurable log level via config or RUST_LOG env var
///
/// The returned guard flushes the file writer when dropped.
pub fn init(config: &LoggingConfig) -> crate::error::Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::NEVER, &log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| crate::error::Error::Config(format!("failed to install logger: {}", e)))?;

    tracing::debug!(log_file = %log_file_path().display(), "Logging initialized");

    Ok(LoggingGuard { _guard: guard })
}

/// Initialize logging to stderr
///
/// Used by command-line tools, where diagnostics belong next to the output.
pub fn init_stderr(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Initialize logging for tests (logs to stdout)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Guard that keeps the logging system alive
///
/// When dropped, flushes any pending log writes.
pub struct LoggingGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Returns the log file path
pub fn log_file_path() -> PathBuf {
    Config::log_path()
}
