//! Logging setup for the refresh rate daemon.
//!
//! JSON output goes to stderr and to a daily-rotating file under the user's
//! local data directory.

use crate::error::LoggingError;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log directory name under the local data directory
const LOG_DIR: &str = "refresh-rate-policy";
/// Log file prefix
const LOG_FILE_PREFIX: &str = "daemon";
/// Maximum number of log files to retain
const MAX_LOG_FILES: usize = 3;

/// Initialize the logging system with both stderr and file output.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_logging() -> Result<LogGuard, LoggingError> {
    let log_dir = log_directory()?;

    std::fs::create_dir_all(&log_dir).map_err(|e| LoggingError::DirectoryCreationFailed {
        path: log_dir.display().to_string(),
        source: e,
    })?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(&log_dir)
        .map_err(|e| LoggingError::AppenderCreationFailed(e.to_string()))?;

    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);
    let (non_blocking_stderr, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(non_blocking_file);

    let stderr_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_current_span(true)
        .with_writer(non_blocking_stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(LogGuard {
        _file_guard: file_guard,
        _stderr_guard: stderr_guard,
    })
}

/// Directory the rotating log files are written to.
pub fn log_directory() -> Result<PathBuf, LoggingError> {
    dirs::data_local_dir()
        .map(|dir| dir.join(LOG_DIR))
        .ok_or(LoggingError::DataDirectoryNotFound)
}

/// Guard that keeps the non-blocking writers alive.
/// Must be held for the lifetime of the application.
pub struct LogGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
    _stderr_guard: tracing_appender::non_blocking::WorkerGuard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory() {
        if let Ok(path) = log_directory() {
            assert!(path.ends_with(LOG_DIR));
        }
    }
}
