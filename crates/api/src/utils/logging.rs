use std::time::Duration;

use hearth_domain::{HearthError, LoggingConfig, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Output is JSON when
/// `config.json` is set, human-readable otherwise.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| HearthError::Configuration(format!("invalid log filter: {e}")))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| HearthError::Configuration(format!("tracing already installed: {e}")))
}

/// Log the outcome of a command execution with structured fields.
///
/// `command` is a stable identifier (e.g. `"sources::register_source"`) and
/// must not carry user data.
#[inline]
pub fn log_command_execution(command: &str, elapsed: Duration, error: Option<&HearthError>) {
    let duration_ms = elapsed.as_millis() as u64;

    match error {
        None => info!(command, duration_ms, "command_execution_success"),
        Some(err) => {
            warn!(command, duration_ms, error_code = err.code(), "command_execution_failure")
        }
    }
}
