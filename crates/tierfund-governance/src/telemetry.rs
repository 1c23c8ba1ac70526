//! Logging setup for hosts embedding the engine.
//!
//! The engine itself only emits `tracing` records; installing a
//! subscriber is left to the host.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ConfigError;

/// Install a global subscriber filtered by `log_level`
/// (an `EnvFilter` directive such as `"info"` or `"tierfund_governance=debug"`).
pub fn init_telemetry(log_level: &str, json_format: bool) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(log_level).map_err(|e| ConfigError::Logging(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if json_format {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().pretty()).try_init()
    };

    installed.map_err(|e| ConfigError::Logging(e.to_string()))
}
