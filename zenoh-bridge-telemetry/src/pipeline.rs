//! Per-frame processing: decode, resolve, validate, forward.

use std::sync::Arc;

use hmi_common::TelemetryRecord;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::codec::{FrameDecoder, FrameError, ParameterId, RawValue};
use crate::events::PipelineEvents;
use crate::registry::{Registry, Resolution};
use crate::validation::{SharedCache, Verdict};

/// A record queued for the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct Forward {
    pub topic: String,
    pub record: TelemetryRecord,
}

/// What happened to one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Queued for publishing.
    Forwarded {
        topic: String,
        value: RawValue,
        fallback: bool,
    },
    /// Identifier not in the registry.
    Unknown(ParameterId),
    /// Out of range with no fallback.
    Suppressed { parameter: String, rejected: RawValue },
    /// Not a valid frame.
    Rejected(FrameError),
    /// Valid, but the forward queue had no room.
    Dropped { topic: String },
}

/// Frame processor bound to one source.
///
/// Cheap to clone: the decoder and registry are shared read-only and the cache
/// is shared behind a lock, so every supervisor gets its own copy.
#[derive(Clone)]
pub struct FramePipeline {
    source: Arc<str>,
    decoder: Arc<FrameDecoder>,
    registry: Arc<Registry>,
    cache: SharedCache,
    events: Arc<dyn PipelineEvents>,
    tx: mpsc::Sender<Forward>,
}

impl FramePipeline {
    pub fn new(
        decoder: FrameDecoder,
        registry: Registry,
        cache: SharedCache,
        events: Arc<dyn PipelineEvents>,
        tx: mpsc::Sender<Forward>,
    ) -> Self {
        Self {
            source: Arc::from(""),
            decoder: Arc::new(decoder),
            registry: Arc::new(registry),
            cache,
            events,
            tx,
        }
    }

    /// A copy that tags records with `source`.
    pub fn for_source(&self, source: &str) -> Self {
        Self {
            source: Arc::from(source),
            ..self.clone()
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Size of one frame on the wire.
    pub fn frame_len(&self) -> usize {
        self.decoder.frame_len()
    }

    pub fn events(&self) -> &Arc<dyn PipelineEvents> {
        &self.events
    }

    /// Run one complete frame through the pipeline. Never blocks.
    ///
    /// A wrong byte count is a framing error. Otherwise an unregistered
    /// identifier is reported as unknown even when its payload would not decode.
    pub fn process(&self, bytes: &[u8]) -> Outcome {
        let source = &*self.source;

        let frame = match self.decoder.decode(bytes) {
            Ok(frame) => frame,
            Err(FrameError::Decode { id, .. }) if self.registry.lookup(id).is_none() => {
                self.events.on_unknown_identifier(source, id);
                return Outcome::Unknown(id);
            }
            Err(e) => {
                self.events.on_frame_error(source, &e);
                return Outcome::Rejected(e);
            }
        };
        self.events.on_frame_decoded(source, &frame);

        let descriptor = match self.registry.resolve(frame.id) {
            Resolution::Known(descriptor) => descriptor,
            Resolution::Unknown(id) => {
                self.events.on_unknown_identifier(source, id);
                return Outcome::Unknown(id);
            }
        };

        let verdict = self.cache.evaluate(descriptor, frame.value);
        let value = match verdict {
            Verdict::Suppressed { rejected } => {
                self.events.on_suppressed(source, descriptor, rejected);
                return Outcome::Suppressed {
                    parameter: descriptor.name.clone(),
                    rejected,
                };
            }
            Verdict::Fallback {
                rejected,
                substitute,
            } => {
                self.events
                    .on_validation_fallback(source, descriptor, rejected, substitute);
                substitute
            }
            Verdict::Unchecked(value) | Verdict::Accepted(value) => value,
        };
        let fallback = verdict.is_fallback();

        let forward = Forward {
            topic: descriptor.topic.clone(),
            record: TelemetryRecord::new(source, &descriptor.name, value).with_fallback(fallback),
        };

        match self.tx.try_send(forward) {
            Ok(()) => {
                self.events
                    .on_forwarded(source, &descriptor.topic, value, fallback);
                Outcome::Forwarded {
                    topic: descriptor.topic.clone(),
                    value,
                    fallback,
                }
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.events.on_forward_dropped(source, &descriptor.topic);
                Outcome::Dropped {
                    topic: descriptor.topic.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ValueEncoding;
    use crate::events::{NoopEvents, TracingEvents};
    use crate::registry::ParameterDescriptor;
    use crate::validation::ValidRange;
    use hmi_common::TelemetryValue;

    fn int_registry() -> Registry {
        Registry::new(vec![
            ParameterDescriptor::new(ParameterId(0x01), "battery_soc", "hmi/pcm/battery_soc")
                .with_rule(ValidRange::at_most(100.0)),
            ParameterDescriptor::new(
                ParameterId(0x02),
                "temperature",
                "hmi/pcm/hv_battery_pack_temp",
            )
            .with_rule(ValidRange::new(15.0, 35.0)),
            ParameterDescriptor::new(ParameterId(0x05), "drive_mode", "hmi/pcm/drive_mode_active"),
        ])
        .unwrap()
    }

    fn pipeline(
        encoding: ValueEncoding,
        registry: Registry,
        capacity: usize,
    ) -> (FramePipeline, mpsc::Receiver<Forward>) {
        let (tx, rx) = mpsc::channel(capacity);
        let pipeline = FramePipeline::new(
            FrameDecoder::new(encoding),
            registry,
            SharedCache::new(),
            Arc::new(NoopEvents),
            tx,
        )
        .for_source("data-source");
        (pipeline, rx)
    }

    #[test]
    fn test_f32_frame_is_forwarded() {
        let (pipeline, mut rx) = pipeline(ValueEncoding::F32, Registry::reference(), 8);

        let outcome = pipeline.process(&[0x01, 0x42, 0xC8, 0x00, 0x00]);
        assert_eq!(
            outcome,
            Outcome::Forwarded {
                topic: "hmi/pcm/battery_soc".into(),
                value: RawValue::F32(100.0),
                fallback: false,
            }
        );

        let forward = rx.try_recv().unwrap();
        assert_eq!(forward.topic, "hmi/pcm/battery_soc");
        assert_eq!(forward.record.source, "data-source");
        assert_eq!(forward.record.parameter, "battery_soc");
        assert_eq!(forward.record.value, TelemetryValue::Float(100.0));
        assert_eq!(forward.record.value.to_string(), "100.0");
        assert!(!forward.record.fallback);
    }

    #[test]
    fn test_i16_fallback_sequence() {
        let (pipeline, mut rx) = pipeline(ValueEncoding::I16, int_registry(), 8);

        pipeline.process(&[0x02, 0x00, 0x14]);
        let outcome = pipeline.process(&[0x02, 0x00, 0x32]);

        assert_eq!(
            outcome,
            Outcome::Forwarded {
                topic: "hmi/pcm/hv_battery_pack_temp".into(),
                value: RawValue::I16(20),
                fallback: true,
            }
        );

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.record.value.to_string(), "20");
        assert_eq!(second.record.value.to_string(), "20");
        assert!(second.record.fallback);
    }

    #[test]
    fn test_out_of_range_without_history_is_suppressed() {
        let (pipeline, mut rx) = pipeline(ValueEncoding::I16, int_registry(), 8);

        let outcome = pipeline.process(&[0x02, 0x00, 0x32]);
        assert_eq!(
            outcome,
            Outcome::Suppressed {
                parameter: "temperature".into(),
                rejected: RawValue::I16(50),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unknown_identifier_is_ignored() {
        let (pipeline, mut rx) = pipeline(ValueEncoding::F32, Registry::reference(), 8);

        let outcome = pipeline.process(&[0x7F, 0x42, 0xC8, 0x00, 0x00]);
        assert_eq!(outcome, Outcome::Unknown(ParameterId(0x7F)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_bad_frames_are_rejected() {
        let (pipeline, mut rx) = pipeline(ValueEncoding::F32, Registry::reference(), 8);

        assert!(matches!(
            pipeline.process(&[0x01, 0x42]),
            Outcome::Rejected(FrameError::Framing { expected: 5, actual: 2 })
        ));
        assert!(matches!(
            pipeline.process(&[0x01, 0x7F, 0xC0, 0x00, 0x00]),
            Outcome::Rejected(FrameError::Decode { .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unknown_identifier_wins_over_bad_payload() {
        let events = Arc::new(TracingEvents::new());
        let (tx, mut rx) = mpsc::channel(8);
        let pipeline = FramePipeline::new(
            FrameDecoder::new(ValueEncoding::F32),
            Registry::reference(),
            SharedCache::new(),
            events.clone(),
            tx,
        );

        // NaN payload behind an identifier nobody registered.
        let outcome = pipeline.process(&[0x09, 0x7F, 0xC0, 0x00, 0x00]);
        assert_eq!(outcome, Outcome::Unknown(ParameterId(0x09)));

        // The same payload on a known identifier is still a decode error.
        assert!(matches!(
            pipeline.process(&[0x01, 0x7F, 0xC0, 0x00, 0x00]),
            Outcome::Rejected(FrameError::Decode { .. })
        ));

        // A short frame stays a framing error whatever its first byte is.
        assert!(matches!(
            pipeline.process(&[0x09, 0x7F]),
            Outcome::Rejected(FrameError::Framing { .. })
        ));

        let stats = events.stats();
        assert_eq!(stats.unknown_identifiers, 1);
        assert_eq!(stats.decode_errors, 1);
        assert_eq!(stats.framing_errors, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let events = Arc::new(TracingEvents::new());
        let (tx, mut rx) = mpsc::channel(1);
        let pipeline = FramePipeline::new(
            FrameDecoder::new(ValueEncoding::I16),
            int_registry(),
            SharedCache::new(),
            events.clone(),
            tx,
        );

        assert!(matches!(pipeline.process(&[0x05, 0x00, 0x01]), Outcome::Forwarded { .. }));
        assert_eq!(
            pipeline.process(&[0x05, 0x00, 0x02]),
            Outcome::Dropped {
                topic: "hmi/pcm/drive_mode_active".into()
            }
        );

        assert_eq!(rx.try_recv().unwrap().record.value, TelemetryValue::Integer(1));
        let stats = events.stats();
        assert_eq!(stats.forwarded, 1);
        assert_eq!(stats.forward_dropped, 1);
    }

    #[test]
    fn test_sources_share_cache() {
        let (pipeline, mut rx) = pipeline(ValueEncoding::I16, int_registry(), 8);
        let primary = pipeline.for_source("primary");
        let backup = pipeline.for_source("backup");

        primary.process(&[0x02, 0x00, 0x19]);
        let outcome = backup.process(&[0x02, 0x00, 0x63]);

        assert!(matches!(
            outcome,
            Outcome::Forwarded {
                fallback: true,
                value: RawValue::I16(25),
                ..
            }
        ));
        assert_eq!(rx.try_recv().unwrap().record.source, "primary");
        assert_eq!(rx.try_recv().unwrap().record.source, "backup");
    }
}
