//! Logging initialization
//!
//! Structured tracing output to the console, with an optional rolling
//! file appender when a log directory is configured. The returned guard
//! must be held for the lifetime of the process so buffered file output
//! is flushed on exit.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::error::{EngineError, Result};

/// Initialize tracing. `RUST_LOG` overrides the default `info` level.
pub fn init(log_directory: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer().with_target(true);

    match log_directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                EngineError::Internal(format!("Failed to create log directory {:?}: {}", dir, e))
            })?;

            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "semfold.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer)
                .try_init()
                .map_err(|e| EngineError::Internal(format!("Failed to init logging: {}", e)))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init()
                .map_err(|e| EngineError::Internal(format!("Failed to init logging: {}", e)))?;
            Ok(None)
        }
    }
}
