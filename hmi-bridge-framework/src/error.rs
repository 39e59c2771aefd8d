//! Error types for the bridge framework.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors surfaced by a bridge process.
///
/// Startup errors (configuration, logging, session) are fatal. Payload and
/// publish errors concern a single value and are reported, never fatal.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Failed to read configuration: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// One or more semantic problems; the message lists all of them.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Zenoh error: {0}")]
    Zenoh(String),

    #[error("Failed to build payload: {0}")]
    Payload(String),

    #[error("Failed to publish to {key}: {message}")]
    Publish { key: String, message: String },
}

impl BridgeError {
    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a publishing error for a key.
    pub fn publish(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Publish {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Whether the error only affects a single published value.
    pub fn is_per_value(&self) -> bool {
        matches!(self, Self::Payload(_) | Self::Publish { .. })
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<hmi_common::Error> for BridgeError {
    fn from(err: hmi_common::Error) -> Self {
        use hmi_common::Error as Common;

        match err {
            Common::Config(msg) => Self::ConfigValidation(msg),
            Common::Topic { .. } => Self::ConfigValidation(err.to_string()),
            Common::Zenoh(e) => Self::Zenoh(e.to_string()),
            Common::Logging(msg) => Self::Logging(msg),
            Common::Encode { .. } | Common::Decode { .. } => Self::Payload(err.to_string()),
        }
    }
}
