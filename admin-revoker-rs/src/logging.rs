//! # Logging
//!
//! Structured logging for the revoker. Human-readable or JSON output goes to
//! stderr so command output on stdout stays clean; audit records carry the
//! `audit` target and can be filtered on their own.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::ConfigError;

const LOG_FILE_PREFIX: &str = "admin-revoker.log";

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Build the filter: `RUST_LOG` when set, otherwise the configured level
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid logging.level {:?}: {}", config.level, e))
        }),
    }
}

/// Install the global subscriber.
///
/// Returns the worker guard of the file appender when `log_dir` is set; it must
/// be held until the process exits or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(None);
    }

    let filter = build_filter(config)?;

    let json_layer = config.json_format.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!config.json_format).then(|| {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
    });

    let (file_layer, guard) = match &config.log_dir {
        Some(log_dir) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ConfigError::AccessError(format!("Failed to set global subscriber: {}", e)))?;

    tracing::debug!(
        level = %config.level,
        json = config.json_format,
        "Logging initialized"
    );

    Ok(guard)
}
