//! Telemetry publisher for Zenoh.

use std::future::Future;
use std::sync::Arc;

use hmi_common::{Format, TelemetryRecord, encode};

use crate::error::{BridgeError, Result};

/// Destination for forwarded telemetry.
///
/// Best-effort: callers log failures and keep going. The Zenoh [`Publisher`]
/// is the production implementation.
pub trait TelemetrySink: Send + Sync + 'static {
    /// Publish one record to `topic`.
    fn publish(
        &self,
        topic: &str,
        record: &TelemetryRecord,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Publisher for sending telemetry to Zenoh.
///
/// Wraps a Zenoh session and serializes [`TelemetryRecord`] values in the
/// configured payload [`Format`]. Topics are used verbatim as key expressions.
#[derive(Clone, Debug)]
pub struct Publisher {
    session: Arc<zenoh::Session>,
    key_prefix: String,
    format: Format,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(
        session: Arc<zenoh::Session>,
        key_prefix: impl Into<String>,
        format: Format,
    ) -> Self {
        Self {
            session,
            key_prefix: key_prefix.into(),
            format,
        }
    }

    /// Get the key prefix used for bridge status messages.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Publish a record to a topic.
    pub async fn publish_record(&self, topic: &str, record: &TelemetryRecord) -> Result<()> {
        let payload = encode(record, self.format)?;
        self.publish_raw(topic, payload).await
    }

    /// Publish raw bytes to a key (for status messages, etc.).
    pub async fn publish_raw(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.session
            .put(key, payload)
            .await
            .map_err(|e| BridgeError::publish(key, e))?;

        Ok(())
    }

    /// Publish a JSON value to a key.
    pub async fn publish_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload =
            serde_json::to_vec(value).map_err(|e| BridgeError::Payload(e.to_string()))?;
        self.publish_raw(key, payload).await
    }
}

impl TelemetrySink for Publisher {
    async fn publish(&self, topic: &str, record: &TelemetryRecord) -> Result<()> {
        self.publish_record(topic, record).await
    }
}
