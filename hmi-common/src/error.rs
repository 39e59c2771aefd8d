use thiserror::Error;

use crate::serialization::Format;

/// Errors from the shared bridge plumbing.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Zenoh error: {0}")]
    Zenoh(#[from] zenoh::Error),

    #[error("Failed to encode {format} payload: {reason}")]
    Encode { format: Format, reason: String },

    #[error("Failed to decode {format} payload: {reason}")]
    Decode { format: Format, reason: String },

    #[error("Invalid topic '{topic}': {reason}")]
    Topic { topic: String, reason: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl Error {
    pub(crate) fn encode(format: Format, reason: impl ToString) -> Self {
        Error::Encode {
            format,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(format: Format, reason: impl ToString) -> Self {
        Error::Decode {
            format,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
