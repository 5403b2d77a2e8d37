//! Logging initialization.
//!
//! With `REGISTER_LOG_DIR` set, logs go to a daily rolling file in that
//! directory; otherwise they go to stderr.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

/// File name prefix for rolling log files.
pub const LOG_FILE_PREFIX: &str = "register.log";

/// Keeps the file writer alive. Dropping it flushes buffered logs.
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,

    /// Directory holding the log files, when file logging is on.
    pub log_dir: Option<PathBuf>,
}

/// Filter from `RUST_LOG`, falling back to the configured level.
fn build_filter(rust_log: Option<String>, level: &str) -> EnvFilter {
    EnvFilter::try_new(rust_log.unwrap_or_else(|| level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(config: &AppConfig) -> Result<LoggingHandle> {
    let filter = build_filter(std::env::var("RUST_LOG").ok(), &config.log_level);

    match config.log_dir.as_deref() {
        Some(dir) => {
            let guard = init_file_logging(dir, filter)?;
            Ok(LoggingHandle {
                _guard: Some(guard),
                log_dir: Some(dir.to_path_buf()),
            })
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;

            Ok(LoggingHandle {
                _guard: None,
                log_dir: None,
            })
        }
    }
}

fn init_file_logging(dir: &Path, filter: EnvFilter) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .try_init()?;

    Ok(guard)
}
