use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Prefix of the daily rolling log files (`hsr_scanner.log.2024-05-01`).
pub const LOG_PREFIX: &str = "hsr_scanner.log";

/// Sets up file + console logging.
///
/// Logs go to a daily rolling file in `log_dir` through a non-blocking writer,
/// so parse threads never wait on disk. The returned guard flushes pending
/// lines on drop and must be held for the life of the process.
pub fn setup_logging(
    log_dir: &Path,
    debug_mode: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = rolling::daily(log_dir, LOG_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = if debug_mode {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Logging already initialized")?;

    tracing::info!(
        log_dir = %log_dir.display(),
        debug = debug_mode,
        "Logging initialized"
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_setup_logging_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");

        // A global subscriber may already be set by another test; the
        // directory is created before that matters.
        let _guard = setup_logging(&log_dir, false);

        assert!(log_dir.exists());
    }
}
