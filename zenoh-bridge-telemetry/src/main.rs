//! Zenoh bridge for fixed-width binary telemetry.
//!
//! Reads `[id][value]` frames from one or more TCP sources, validates them
//! and republishes each parameter on its Zenoh topic.

use std::sync::Arc;

use anyhow::{Context, Result};
use hmi_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
use tokio::sync::mpsc;
use zenoh_bridge_telemetry::{
    FramePipeline, SharedCache, Supervisor, TelemetryBridgeConfig, TracingEvents, forwarder,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("telemetry.json5");

    let config = TelemetryBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let telemetry = config.telemetry.clone();
    let registry = telemetry.registry()?;
    let decoder = telemetry.decoder(&registry)?;

    let runner = BridgeRunner::new_with_args("telemetry", config, Some(&args))
        .await
        .context("Failed to start bridge")?;
    let mut runner = runner.with_status_publishing().with_format(telemetry.format);

    tracing::info!(
        parameters = registry.len(),
        encoding = %decoder.encoding(),
        frame_len = decoder.frame_len(),
        format = telemetry.format.as_str(),
        "Telemetry pipeline configured"
    );

    let metadata = serde_json::json!({
        "sources": telemetry.sources.iter().map(|s| s.connection.to_string()).collect::<Vec<_>>(),
        "encoding": decoder.encoding().as_str(),
        "format": telemetry.format.as_str(),
        "parameters": registry.len(),
    });

    let events = Arc::new(TracingEvents::new());
    let (tx, rx) = mpsc::channel(telemetry.channel_capacity);
    let pipeline = FramePipeline::new(decoder, registry, SharedCache::new(), events.clone(), tx);

    for source in &telemetry.sources {
        let supervisor = Supervisor::new(source, &pipeline);
        runner.spawn(
            format!("source {}", source.name),
            supervisor.run(runner.shutdown_signal()),
        );
    }

    // The forwarder stops once every supervisor has dropped its sender.
    drop(pipeline);
    runner.spawn("forwarder", forwarder::run(runner.publisher(), rx, events.clone()));

    runner.run_with_metadata(Some(metadata)).await?;

    match serde_json::to_string(&events.stats()) {
        Ok(stats) => tracing::info!(stats = %stats, "Final statistics"),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize final statistics"),
    }

    Ok(())
}
