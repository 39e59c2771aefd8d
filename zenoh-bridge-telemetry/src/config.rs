//! Configuration for the telemetry bridge.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use hmi_bridge_framework::{BridgeConfig, BridgeError, Format, LoggingConfig, ZenohConfig};
use serde::{Deserialize, Serialize};

use crate::codec::{FrameDecoder, ValueEncoding};
use crate::registry::{ParameterDescriptor, Registry};

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryBridgeConfig {
    /// Zenoh connection settings
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Telemetry stream settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Telemetry stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Key expression prefix for bridge status (default: "hmi/telemetry")
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Payload format for published values
    #[serde(default)]
    pub format: Format,

    /// Value encoding on the wire; fixes the frame size
    #[serde(default)]
    pub encoding: ValueEncoding,

    /// Records buffered between the sources and the bus
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Streams to read
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,

    /// Parameter table. Empty means the stock vehicle table.
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

fn default_key_prefix() -> String {
    "hmi/telemetry".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_sources() -> Vec<SourceConfig> {
    vec![SourceConfig::default()]
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            format: Format::default(),
            encoding: ValueEncoding::default(),
            channel_capacity: default_channel_capacity(),
            sources: default_sources(),
            parameters: Vec::new(),
        }
    }
}

impl TelemetryConfig {
    /// Build the parameter registry. No `parameters` means the stock table.
    pub fn registry(&self) -> Result<Registry, BridgeError> {
        let registry = Registry::new(self.parameters.clone())
            .map_err(|e| BridgeError::validation(e.to_string()))?;
        if registry.is_empty() {
            return Ok(Registry::reference());
        }
        Ok(registry)
    }

    /// Build the frame decoder, honouring per-parameter encodings.
    pub fn decoder(&self, registry: &Registry) -> Result<FrameDecoder, BridgeError> {
        registry
            .iter()
            .filter_map(|d| d.encoding.map(|encoding| (d.id, encoding)))
            .try_fold(FrameDecoder::new(self.encoding), |decoder, (id, encoding)| {
                decoder.with_override(id, encoding)
            })
            .map_err(|e| BridgeError::validation(e.to_string()))
    }
}

/// A single telemetry stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name (tags published records and log lines)
    pub name: String,

    /// How to reach the data source
    pub connection: ConnectionConfig,

    /// Drop the connection after this many seconds without data
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: "data-source".to_string(),
            connection: ConnectionConfig::Listen {
                host: "0.0.0.0".to_string(),
                port: 1048,
            },
            idle_timeout_secs: None,
        }
    }
}

impl SourceConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

/// Connection direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// Accept inbound connections from the data source.
    Listen { host: String, port: u16 },

    /// Connect out to the data source, retrying after `reconnect_delay_secs`.
    Dial {
        host: String,
        port: u16,
        #[serde(default)]
        reconnect_delay_secs: Option<u64>,
    },
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionConfig::Listen { host, port } => write!(f, "listen://{}:{}", host, port),
            ConnectionConfig::Dial { host, port, .. } => write!(f, "dial://{}:{}", host, port),
        }
    }
}

impl BridgeConfig for TelemetryBridgeConfig {
    fn zenoh(&self) -> &ZenohConfig {
        &self.zenoh
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn key_prefix(&self) -> &str {
        &self.telemetry.key_prefix
    }

    fn validate(&self) -> Result<(), BridgeError> {
        let telemetry = &self.telemetry;

        self.zenoh.validate()?;

        hmi_common::validate_topic(&telemetry.key_prefix)
            .map_err(|e| BridgeError::validation(format!("key_prefix: {}", e)))?;

        if telemetry.channel_capacity == 0 {
            return Err(BridgeError::validation("channel_capacity must be at least 1"));
        }

        if telemetry.sources.is_empty() {
            return Err(BridgeError::validation(
                "At least one source must be configured",
            ));
        }

        let mut names = HashSet::new();
        for source in &telemetry.sources {
            if source.name.trim().is_empty() {
                return Err(BridgeError::validation("Source name cannot be empty"));
            }
            if !names.insert(source.name.as_str()) {
                return Err(BridgeError::validation(format!(
                    "Source '{}' is configured more than once",
                    source.name
                )));
            }
            if source.idle_timeout_secs == Some(0) {
                return Err(BridgeError::validation(format!(
                    "Source '{}': idle_timeout_secs must be at least 1",
                    source.name
                )));
            }
            if let ConnectionConfig::Dial {
                port,
                reconnect_delay_secs,
                ..
            } = &source.connection
            {
                if *port == 0 {
                    return Err(BridgeError::validation(format!(
                        "Source '{}': dial port cannot be 0",
                        source.name
                    )));
                }
                if *reconnect_delay_secs == Some(0) {
                    return Err(BridgeError::validation(format!(
                        "Source '{}': reconnect_delay_secs must be at least 1",
                        source.name
                    )));
                }
            }
        }

        let registry = telemetry.registry()?;
        telemetry.decoder(&registry)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ParameterId;
    use crate::validation::ValidRange;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TelemetryBridgeConfig::from_json5("{}").unwrap();

        assert_eq!(config.telemetry.key_prefix, "hmi/telemetry");
        assert_eq!(config.telemetry.format, Format::Text);
        assert_eq!(config.telemetry.encoding, ValueEncoding::F32);
        assert_eq!(config.telemetry.channel_capacity, 1024);
        assert_eq!(config.telemetry.sources, vec![SourceConfig::default()]);
        assert_eq!(
            config.telemetry.sources[0].connection.to_string(),
            "listen://0.0.0.0:1048"
        );
        assert_eq!(config.telemetry.registry().unwrap().len(), 5);
    }

    #[test]
    fn test_parse_full_config() {
        let config = TelemetryBridgeConfig::from_json5(
            r#"{
                zenoh: { mode: "client", connect: ["tcp/127.0.0.1:7447"] },
                telemetry: {
                    key_prefix: "hmi/bench",
                    format: "json",
                    encoding: "i16",
                    channel_capacity: 16,
                    sources: [
                        { name: "target", connection: { mode: "dial", host: "10.0.0.2", port: 1048, reconnect_delay_secs: 2 }, idle_timeout_secs: 30 },
                        { name: "replay", connection: { mode: "listen", host: "127.0.0.1", port: 2048 } },
                    ],
                    parameters: [
                        { id: 1, name: "battery_soc", topic: "hmi/pcm/battery_soc", range: { max: 100 } },
                        { id: 2, name: "temperature", topic: "hmi/pcm/hv_battery_pack_temp", range: { min: 15, max: 35 } },
                        { id: 5, name: "drive_mode", topic: "hmi/pcm/drive_mode_active", encoding: "u16" },
                    ],
                },
                logging: { level: "debug", format: "json" },
            }"#,
        )
        .unwrap();

        let telemetry = &config.telemetry;
        assert_eq!(config.key_prefix(), "hmi/bench");
        assert_eq!(config.zenoh().mode, hmi_common::ZenohMode::Client);
        assert_eq!(config.logging().format, hmi_common::LogFormat::Json);
        assert_eq!(telemetry.format, Format::Json);
        assert_eq!(telemetry.sources.len(), 2);
        assert_eq!(
            telemetry.sources[0].connection,
            ConnectionConfig::Dial {
                host: "10.0.0.2".into(),
                port: 1048,
                reconnect_delay_secs: Some(2)
            }
        );
        assert_eq!(telemetry.sources[0].idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(telemetry.sources[1].idle_timeout(), None);

        let registry = telemetry.registry().unwrap();
        assert_eq!(
            registry.lookup(ParameterId(2)).unwrap().rule,
            Some(ValidRange::new(15.0, 35.0))
        );

        let decoder = telemetry.decoder(&registry).unwrap();
        assert_eq!(decoder.frame_len(), 3);
        assert_eq!(decoder.encoding_for(ParameterId(5)), ValueEncoding::U16);
        assert_eq!(decoder.encoding_for(ParameterId(1)), ValueEncoding::I16);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            r#"{ telemetry: { sources: [] } }"#,
            r#"{ telemetry: { channel_capacity: 0 } }"#,
            r#"{ telemetry: { key_prefix: "hmi/*" } }"#,
            r#"{ zenoh: { connect: ["192.168.1.1:7447"] } }"#,
            r#"{ telemetry: { sources: [
                { name: "a", connection: { mode: "listen", host: "0.0.0.0", port: 1 } },
                { name: "a", connection: { mode: "listen", host: "0.0.0.0", port: 2 } },
            ] } }"#,
            r#"{ telemetry: { sources: [{ name: "a", connection: { mode: "dial", host: "h", port: 0 } }] } }"#,
            r#"{ telemetry: { sources: [{ name: "a", connection: { mode: "dial", host: "h", port: 1, reconnect_delay_secs: 0 } }] } }"#,
            r#"{ telemetry: { parameters: [
                { id: 1, name: "a", topic: "hmi/a" },
                { id: 1, name: "b", topic: "hmi/b" },
            ] } }"#,
            r#"{ telemetry: { parameters: [{ id: 2, name: "t", topic: "hmi/t", range: { min: 35, max: 15 } }] } }"#,
            r#"{ telemetry: { encoding: "f32", parameters: [{ id: 1, name: "a", topic: "hmi/a", encoding: "i16" }] } }"#,
        ];

        for case in cases {
            let err = TelemetryBridgeConfig::from_json5(case).unwrap_err();
            assert!(
                matches!(err, BridgeError::ConfigValidation(_)),
                "{}: {}",
                case,
                err
            );
        }
    }

    #[test]
    fn test_unknown_connection_mode_is_a_parse_error() {
        let err = TelemetryBridgeConfig::from_json5(
            r#"{ telemetry: { sources: [{ name: "a", connection: { mode: "serial", host: "h", port: 1 } }] } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::ConfigParse(_)));
    }

    #[test]
    fn test_sample_config() {
        let config = TelemetryBridgeConfig::from_json5(include_str!("../telemetry.json5")).unwrap();
        let registry = config.telemetry.registry().unwrap();

        assert_eq!(registry.len(), 5);
        assert_eq!(
            registry.lookup(ParameterId(1)).unwrap().rule,
            Some(ValidRange::at_most(100.0))
        );
        assert_eq!(config.telemetry.sources, vec![SourceConfig::default()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.json5");
        std::fs::write(
            &path,
            r#"{ telemetry: { encoding: "i16", sources: [{ name: "bench", connection: { mode: "listen", host: "127.0.0.1", port: 1048 } }] } }"#,
        )
        .unwrap();

        let config = TelemetryBridgeConfig::load(&path).unwrap();
        assert_eq!(config.telemetry.encoding, ValueEncoding::I16);
        assert_eq!(config.telemetry.sources[0].name, "bench");
    }
}
