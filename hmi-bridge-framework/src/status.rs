//! Bridge status messages on `<key_prefix>/@/status`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use hmi_common::current_timestamp_millis;

use crate::Result;
use crate::publisher::Publisher;

/// Lifecycle state announced on the status key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Running,
    Offline,
}

/// One status message.
///
/// Bridge-specific metadata is flattened next to the fixed fields, so a
/// subscriber sees `{bridge, version, status, timestamp, sources, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub bridge: String,
    pub version: String,
    pub status: BridgeState,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl BridgeStatus {
    pub fn new(bridge: impl Into<String>, version: impl Into<String>, status: BridgeState) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status,
            timestamp: current_timestamp_millis(),
            metadata: Map::new(),
        }
    }

    /// Merge an object into the metadata. Non-object values are ignored, and
    /// keys that collide with the fixed fields are dropped.
    pub fn with_metadata(mut self, metadata: &Value) -> Self {
        if let Value::Object(map) = metadata {
            for (key, value) in map {
                if !matches!(key.as_str(), "bridge" | "version" | "status" | "timestamp") {
                    self.metadata.insert(key.clone(), value.clone());
                }
            }
        }
        self
    }
}

/// Announces the bridge's lifecycle on its status key.
///
/// The same metadata accompanies every announcement, so a late subscriber of
/// the offline message still learns which sources the bridge served.
pub struct StatusPublisher {
    publisher: Publisher,
    bridge: String,
    version: String,
    metadata: Value,
}

impl StatusPublisher {
    pub fn new(
        publisher: Publisher,
        bridge: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            bridge: bridge.into(),
            version: version.into(),
            metadata: Value::Null,
        }
    }

    pub fn set_metadata(&mut self, metadata: Value) {
        self.metadata = metadata;
    }

    /// Key the status is published to.
    pub fn key(&self) -> String {
        hmi_common::status_key(self.publisher.key_prefix())
    }

    /// Build the message for `state` without publishing it.
    pub fn status(&self, state: BridgeState) -> BridgeStatus {
        BridgeStatus::new(&self.bridge, &self.version, state).with_metadata(&self.metadata)
    }

    pub async fn announce(&self, state: BridgeState) -> Result<()> {
        self.publisher
            .publish_json(&self.key(), &self.status(state))
            .await
    }
}
