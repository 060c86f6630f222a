//! File logging for R Bridge
//!
//! stdout carries the interpreter transcript (or NDJSON in headless mode),
//! so tracing output goes to a daily rolling file instead.

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Result, ResultExt};

/// Environment variable that overrides the log filter
pub const LOG_ENV_VAR: &str = "RBRIDGE_LOG";

/// Filter used when `RBRIDGE_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "r_bridge=info,rbridge_app=info,rbridge_process=info,warn";

/// Prefix of the daily log files
const LOG_FILE_PREFIX: &str = "rbridge.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Install the global subscriber, writing to [`log_directory`].
///
/// ```bash
/// RBRIDGE_LOG=debug rbridge
/// RBRIDGE_LOG=rbridge_process=trace rbridge --headless
/// ```
pub fn init() -> Result<PathBuf> {
    let log_dir = log_directory();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(TIMESTAMP_FORMAT.to_string())),
        )
        .init();

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("R Bridge starting, logging to {}", log_dir.display());
    tracing::info!("═══════════════════════════════════════════════════════");

    Ok(log_dir)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// `<data local dir>/r-bridge/logs`, or `./r-bridge/logs` without one
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("r-bridge")
        .join("logs")
}
