//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` (honours
//! `RUST_LOG`), a console layer in plain or JSON form and an optional file
//! layer. Safe to call more than once; only the first call installs anything.

use std::fs::OpenOptions;
use std::sync::Mutex;

use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Filter used when `RUST_LOG` is unset.
pub fn default_env_filter(config: &LoggingConfig) -> EnvFilter {
    let level = config.log_level.to_string().to_lowercase();
    EnvFilter::new(format!("{level},{}={level}", env!("CARGO_PKG_NAME")))
}

/// Install the global subscriber described by `config`.
///
/// # Errors
/// Returns `ProtocolError::ConfigError` if the log file cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter(config));

    let console_plain = (config.log_to_console && !config.json_format).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_level(true)
    });
    let console_json = (config.log_to_console && config.json_format)
        .then(|| fmt::layer().with_target(true).with_thread_names(true).json());

    let file_layer = match (config.log_to_file, config.log_file_path.as_deref()) {
        (true, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    ProtocolError::ConfigError(format!("Failed to open log file {path}: {e}"))
                })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .json(),
            )
        }
        _ => None,
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console_plain)
        .with(console_json)
        .with(file_layer)
        .try_init();

    // The host application may already own the global slot.
    if installed.is_err() {
        debug!("Global tracing subscriber already set");
    }
    let _ = INSTALLED.set(());
    debug!(app = %config.app_name, "Logging initialised");
    Ok(())
}
