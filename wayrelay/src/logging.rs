//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when a directory is configured, to a daily rolling
//! file. `RUST_LOG` overrides the configured level.

use std::path::Path;

use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;
use crate::error::GuidanceError;

/// Prefix of the rolling log files (`wayrelay.log.YYYY-MM-DD`).
pub const LOG_FILE_PREFIX: &str = "wayrelay.log";

/// Keeps the file writer alive. Hold it until the process exits; dropping it
/// flushes buffered lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Installs the global subscriber.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, GuidanceError> {
    let filter = build_filter(&settings.level)?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::new(Rfc3339))
        .with_target(false);

    let (file_layer, guard) = match &settings.directory {
        Some(directory) => {
            create_log_directory(directory)?;
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::new(Rfc3339));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| GuidanceError::Logging(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

/// The filter from `RUST_LOG` if set, otherwise from `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, GuidanceError> {
    let directive = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.trim().is_empty() => env,
        _ => level.to_string(),
    };
    EnvFilter::try_new(&directive)
        .map_err(|e| GuidanceError::Logging(format!("invalid log filter '{}': {}", directive, e)))
}

fn create_log_directory(directory: &Path) -> Result<(), GuidanceError> {
    std::fs::create_dir_all(directory).map_err(|e| {
        GuidanceError::Logging(format!(
            "cannot create log directory {}: {}",
            directory.display(),
            e
        ))
    })
}
