// Logging module for structured logging using the tracing crate

use crate::config::{LogFormat, LoggingConfig};
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Build the event filter: `RUST_LOG` wins over the configured level.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, Box<dyn Error>> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.level.trim())
        .map_err(|e| format!("Invalid log level '{}': {}", config.level, e).into())
}

/// Initialize the global tracing subscriber
///
/// Events go to stderr so stdout stays free for command output. JSON is the
/// default format for log aggregation; `pretty` is meant for terminals.
///
/// Calling this more than once is a no-op.
///
/// # Examples
///
/// ```
/// use boothmark::config::LoggingConfig;
/// use boothmark::logging::init_subscriber;
///
/// init_subscriber(&LoggingConfig::default()).expect("Failed to initialize logging");
/// tracing::info!("Application started");
/// ```
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), Box<dyn Error>> {
    if INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    result.map_err(|e| -> Box<dyn Error> { e })?;

    INITIALIZED.store(true, Ordering::SeqCst);
    Ok(())
}
