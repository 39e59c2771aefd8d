//! HMI Common Library
//!
//! Shared types and utilities for the HMI telemetry bridge:
//!
//! - [`telemetry`] - What gets published on the bus (`TelemetryRecord`, `TelemetryValue`)
//! - [`serialization`] - Text/JSON/CBOR payload encoding and decoding
//! - [`config`] - `zenoh` and `logging` configuration sections
//! - [`session`] - Zenoh session management
//! - [`keyexpr`] - Topic validation and status key builders
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod keyexpr;
pub mod serialization;
pub mod session;
pub mod telemetry;

pub use config::{LogFormat, LoggingConfig, ZenohConfig, ZenohMode};
pub use error::{Error, Result};
pub use keyexpr::{status_key, validate_topic};
pub use serialization::{Format, decode, encode};
pub use session::connect;
pub use telemetry::{TelemetryRecord, TelemetryValue, current_timestamp_millis};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level when set. Fails if a
/// subscriber is already installed or the level is not a valid filter.
///
/// # Example
///
/// ```ignore
/// use hmi_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| Error::Logging(format!("level '{}': {}", config.level, e)))?,
    };

    let (text, json) = match config.format {
        LogFormat::Text => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
