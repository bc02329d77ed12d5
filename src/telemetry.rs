use crate::config::StageboardConfig;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Builds the log filter: `RUST_LOG` when set, otherwise `default_filter`.
pub fn env_filter(default_filter: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter)
            .with_context(|| format!("Invalid log filter: {}", default_filter)),
    }
}

/// Installs a global fmt subscriber.
///
/// Returns `Ok(false)` when a subscriber was already installed.
pub fn init_logging(default_filter: &str) -> Result<bool> {
    let filter = env_filter(default_filter)?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok())
}

/// Installs the subscriber with the configured `[logging] filter`
pub fn init_logging_from(config: &StageboardConfig) -> Result<bool> {
    init_logging(&config.logging.filter)
}
