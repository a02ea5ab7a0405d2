//! Tracing subscriber setup

use std::path::PathBuf;

use compact_str::CompactString;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::result::{RelayError, Result};

const LOG_FILE_PREFIX: &str = "ghrelay.log";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub default_directive: CompactString,
    /// Directory for daily-rolled log files; stderr only when absent
    pub log_dir: Option<PathBuf>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { default_directive: "info".into(), log_dir: None, json: false }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: Option<&str>) -> Self {
        if let Some(level) = level {
            self.default_directive = level.into();
        }
        self
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.default_directive.as_str()).map_err(|e| {
            RelayError::config_validation_error("log_level", format!("{e}"))
        })?,
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let stderr = fmt::layer().with_writer(std::io::stderr).with_target(false);
    if config.json {
        layers.push(stderr.json().boxed());
    } else {
        layers.push(stderr.boxed());
    }

    let guard = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = fmt::layer().with_writer(writer).with_ansi(false);
            if config.json {
                layers.push(file.json().boxed());
            } else {
                layers.push(file.boxed());
            }
            Some(guard)
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| RelayError::general(format!("Failed to initialize logging: {e}")))?;

    Ok(guard)
}
