//! Logging configuration

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::ServiceError;

/// Initialize logging with the given default level.
///
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(default_level: &str) -> Result<(), ServiceError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| ServiceError::ConfigError(e.to_string()))?;

    Ok(())
}
