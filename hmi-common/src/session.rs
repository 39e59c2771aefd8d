use zenoh::Session;

use crate::config::ZenohConfig;
use crate::error::{Error, Result};

/// Translate the bridge's `zenoh` section into a native Zenoh config.
pub fn build_zenoh_config(config: &ZenohConfig) -> Result<zenoh::Config> {
    config.validate()?;

    let mut zenoh_config = zenoh::Config::default();
    set_json5(&mut zenoh_config, "mode", &format!("\"{}\"", config.mode))?;

    if !config.connect.is_empty() {
        set_json5(&mut zenoh_config, "connect/endpoints", &json_list(&config.connect)?)?;
    }
    if !config.listen.is_empty() {
        set_json5(&mut zenoh_config, "listen/endpoints", &json_list(&config.listen)?)?;
    }

    Ok(zenoh_config)
}

fn json_list(endpoints: &[String]) -> Result<String> {
    serde_json::to_string(endpoints).map_err(|e| Error::Config(e.to_string()))
}

fn set_json5(zenoh_config: &mut zenoh::Config, key: &str, value: &str) -> Result<()> {
    zenoh_config
        .insert_json5(key, value)
        .map_err(|e| Error::Config(format!("zenoh '{}' = {}: {}", key, value, e)))
}

/// Open the bus session. Called once at startup; the session heals its own links afterwards.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let zenoh_config = build_zenoh_config(config)?;

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        "Opening Zenoh session"
    );

    let session = zenoh::open(zenoh_config).await?;
    tracing::info!(zid = %session.zid(), "Zenoh session open");

    Ok(session)
}
