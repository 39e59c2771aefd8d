//! The `BridgeConfig` trait: JSON5 loading followed by validation.

use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, ZenohConfig};

/// A bridge's top-level configuration.
///
/// Every bridge config carries a `zenoh` and a `logging` section plus its own
/// protocol section; the runner only needs the accessors below. A config that
/// parses but fails [`validate`](Self::validate) is never handed to the runner.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct BenchConfig {
///     #[serde(default)]
///     zenoh: ZenohConfig,
///     #[serde(default)]
///     logging: LoggingConfig,
///     bench: BenchSection,
/// }
///
/// impl BridgeConfig for BenchConfig {
///     fn zenoh(&self) -> &ZenohConfig { &self.zenoh }
///     fn logging(&self) -> &LoggingConfig { &self.logging }
///     fn key_prefix(&self) -> &str { &self.bench.key_prefix }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    fn zenoh(&self) -> &ZenohConfig;

    fn logging(&self) -> &LoggingConfig;

    /// Prefix of the bridge's own keys, e.g. `<key_prefix>/@/status`.
    fn key_prefix(&self) -> &str;

    /// Semantic checks run after parsing.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn from_json5(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            },
            _ => BridgeError::ConfigRead(e),
        })?;

        Self::from_json5(&content)
    }
}
