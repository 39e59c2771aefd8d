//! Drains the forward queue into the bus.

use std::sync::Arc;

use hmi_bridge_framework::TelemetrySink;
use tokio::sync::mpsc;

use crate::events::PipelineEvents;
use crate::pipeline::Forward;

/// Publish queued records until every pipeline has been dropped.
///
/// Publish failures are reported and skipped; they never stop the loop.
pub async fn run<S: TelemetrySink>(
    sink: S,
    mut rx: mpsc::Receiver<Forward>,
    events: Arc<dyn PipelineEvents>,
) {
    while let Some(forward) = rx.recv().await {
        match sink.publish(&forward.topic, &forward.record).await {
            Ok(()) => events.on_published(&forward.topic),
            Err(e) => events.on_publish_error(&forward.topic, &e),
        }
    }

    tracing::debug!("Forward queue closed");
}
