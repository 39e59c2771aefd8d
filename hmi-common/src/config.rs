use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Role of the bridge's Zenoh session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZenohMode {
    /// Joins the local mesh directly (default).
    #[default]
    Peer,
    /// Goes through a router listed in `connect`.
    Client,
    Router,
}

impl ZenohMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZenohMode::Peer => "peer",
            ZenohMode::Client => "client",
            ZenohMode::Router => "router",
        }
    }
}

impl std::fmt::Display for ZenohMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `zenoh` section of a bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZenohConfig {
    #[serde(default)]
    pub mode: ZenohMode,

    /// Endpoints to connect to, e.g. `tcp/192.168.1.1:7447`.
    #[serde(default)]
    pub connect: Vec<String>,

    /// Endpoints to listen on.
    #[serde(default)]
    pub listen: Vec<String>,
}

impl ZenohConfig {
    /// Check that every endpoint has the `<protocol>/<address>` shape.
    pub fn validate(&self) -> Result<()> {
        for endpoint in self.connect.iter().chain(&self.listen) {
            match endpoint.split_once('/') {
                Some((proto, addr)) if !proto.is_empty() && !addr.is_empty() => {}
                _ => {
                    return Err(Error::Config(format!(
                        "Zenoh endpoint '{}' must look like 'tcp/host:port'",
                        endpoint
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for log shippers.
    Json,
}

/// `logging` section of a bridge configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "zenoh_bridge_telemetry=debug".
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Copy of this config with the level replaced, if an override is given.
    pub fn with_level_override(&self, level: Option<&str>) -> Self {
        match level {
            Some(level) => Self {
                level: level.to_string(),
                ..self.clone()
            },
            None => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sections {
        #[serde(default)]
        zenoh: ZenohConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn test_parse_sections() {
        let config: Sections = json5::from_str(
            r#"{
                zenoh: { mode: "client", connect: ["tcp/localhost:7447"] },
                logging: { level: "debug", format: "json" },
            }"#,
        )
        .unwrap();

        assert_eq!(config.zenoh.mode, ZenohMode::Client);
        assert_eq!(config.zenoh.connect, vec!["tcp/localhost:7447"]);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_defaults() {
        let config: Sections = json5::from_str("{}").unwrap();

        assert_eq!(config.zenoh, ZenohConfig::default());
        assert_eq!(config.zenoh.mode.as_str(), "peer");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(json5::from_str::<Sections>(r#"{ zenoh: { mode: "broker" } }"#).is_err());
    }

    #[test]
    fn test_endpoint_shape() {
        let mut config = ZenohConfig {
            connect: vec!["tcp/127.0.0.1:7447".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.listen = vec!["127.0.0.1:7447".to_string()];
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_level_override() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Json,
        };

        let overridden = config.with_level_override(Some("trace"));
        assert_eq!(overridden.level, "trace");
        assert_eq!(overridden.format, LogFormat::Json);
        assert_eq!(config.with_level_override(None), config);
    }
}
