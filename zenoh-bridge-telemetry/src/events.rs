//! Pipeline observability.
//!
//! The pipeline, supervisors and forwarder report what happens to each frame
//! through [`PipelineEvents`]. [`TracingEvents`] turns those reports into
//! structured `tracing` events and keeps counters for the final statistics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use hmi_bridge_framework::BridgeError;
use serde::Serialize;

use crate::codec::{Frame, FrameError, ParameterId, RawValue};
use crate::registry::ParameterDescriptor;
use crate::supervisor::ConnectionState;

/// Observer for pipeline activity. Every hook defaults to a no-op.
pub trait PipelineEvents: Send + Sync {
    /// A frame decoded cleanly.
    fn on_frame_decoded(&self, _source: &str, _frame: &Frame) {}

    /// A frame carried an identifier missing from the registry.
    fn on_unknown_identifier(&self, _source: &str, _id: ParameterId) {}

    /// An out-of-range value was replaced by the last known good one.
    fn on_validation_fallback(
        &self,
        _source: &str,
        _parameter: &ParameterDescriptor,
        _rejected: RawValue,
        _substitute: RawValue,
    ) {
    }

    /// An out-of-range value had nothing to fall back to.
    fn on_suppressed(&self, _source: &str, _parameter: &ParameterDescriptor, _rejected: RawValue) {
    }

    /// A frame was dropped by the decoder.
    fn on_frame_error(&self, _source: &str, _error: &FrameError) {}

    /// The supervisor of `source` moved between connection states.
    fn on_connection_state_change(
        &self,
        _source: &str,
        _from: ConnectionState,
        _to: ConnectionState,
    ) {
    }

    /// A value was handed to the bus forwarder.
    fn on_forwarded(&self, _source: &str, _topic: &str, _value: RawValue, _fallback: bool) {}

    /// The forwarder queue was full and a value was discarded.
    fn on_forward_dropped(&self, _source: &str, _topic: &str) {}

    /// A record reached the bus.
    fn on_published(&self, _topic: &str) {}

    /// The bus rejected a record.
    fn on_publish_error(&self, _topic: &str, _error: &BridgeError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl PipelineEvents for NoopEvents {}

/// Counter snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub uptime_secs: u64,
    pub frames_decoded: u64,
    pub unknown_identifiers: u64,
    pub fallbacks: u64,
    pub suppressed: u64,
    pub framing_errors: u64,
    pub decode_errors: u64,
    pub connections: u64,
    pub forwarded: u64,
    pub forward_dropped: u64,
    pub published: u64,
    pub publish_errors: u64,
}

/// Production observer: logs through `tracing` and counts.
#[derive(Debug)]
pub struct TracingEvents {
    start_time: Instant,
    frames_decoded: AtomicU64,
    unknown_identifiers: AtomicU64,
    fallbacks: AtomicU64,
    suppressed: AtomicU64,
    framing_errors: AtomicU64,
    decode_errors: AtomicU64,
    connections: AtomicU64,
    forwarded: AtomicU64,
    forward_dropped: AtomicU64,
    published: AtomicU64,
    publish_errors: AtomicU64,
}

impl Default for TracingEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingEvents {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            frames_decoded: AtomicU64::new(0),
            unknown_identifiers: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            forward_dropped: AtomicU64::new(0),
            published: AtomicU64::new(0),
            publish_errors: AtomicU64::new(0),
        }
    }

    /// Current counter values.
    pub fn stats(&self) -> PipelineStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PipelineStats {
            uptime_secs: self.start_time.elapsed().as_secs(),
            frames_decoded: load(&self.frames_decoded),
            unknown_identifiers: load(&self.unknown_identifiers),
            fallbacks: load(&self.fallbacks),
            suppressed: load(&self.suppressed),
            framing_errors: load(&self.framing_errors),
            decode_errors: load(&self.decode_errors),
            connections: load(&self.connections),
            forwarded: load(&self.forwarded),
            forward_dropped: load(&self.forward_dropped),
            published: load(&self.published),
            publish_errors: load(&self.publish_errors),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PipelineEvents for TracingEvents {
    fn on_frame_decoded(&self, source: &str, frame: &Frame) {
        bump(&self.frames_decoded);
        tracing::trace!(source, id = %frame.id, value = %frame.value, "Frame decoded");
    }

    fn on_unknown_identifier(&self, source: &str, id: ParameterId) {
        bump(&self.unknown_identifiers);
        tracing::debug!(source, id = %id, "Unknown identifier, frame ignored");
    }

    fn on_validation_fallback(
        &self,
        source: &str,
        parameter: &ParameterDescriptor,
        rejected: RawValue,
        substitute: RawValue,
    ) {
        bump(&self.fallbacks);
        tracing::warn!(
            source,
            parameter = %parameter.name,
            rejected = %rejected,
            substitute = %substitute,
            "Value out of range, using last known good value"
        );
    }

    fn on_suppressed(&self, source: &str, parameter: &ParameterDescriptor, rejected: RawValue) {
        bump(&self.suppressed);
        tracing::warn!(
            source,
            parameter = %parameter.name,
            rejected = %rejected,
            "Value out of range and no fallback available, suppressed"
        );
    }

    fn on_frame_error(&self, source: &str, error: &FrameError) {
        if error.is_framing() {
            bump(&self.framing_errors);
        } else {
            bump(&self.decode_errors);
        }
        tracing::warn!(source, error = %error, "Frame dropped");
    }

    fn on_connection_state_change(&self, source: &str, from: ConnectionState, to: ConnectionState) {
        if to == ConnectionState::Connected {
            bump(&self.connections);
        }
        tracing::info!(source, from = %from, to = %to, "Connection state changed");
    }

    fn on_forwarded(&self, source: &str, topic: &str, value: RawValue, fallback: bool) {
        bump(&self.forwarded);
        tracing::trace!(source, topic, value = %value, fallback, "Value forwarded");
    }

    fn on_forward_dropped(&self, source: &str, topic: &str) {
        bump(&self.forward_dropped);
        tracing::warn!(source, topic, "Forward queue full, value dropped");
    }

    fn on_published(&self, topic: &str) {
        bump(&self.published);
        tracing::trace!(topic, "Published");
    }

    fn on_publish_error(&self, topic: &str, error: &BridgeError) {
        bump(&self.publish_errors);
        tracing::warn!(topic, error = %error, "Publish failed");
    }
}
