//! Zenoh bridge for fixed-width binary telemetry.
//!
//! An embedded target streams frames of `[1 byte id][W bytes value]` over
//! TCP. This crate reassembles and decodes those frames, maps identifiers to
//! named parameters, filters implausible readings with a last-known-good
//! fallback, and republishes every value on its own Zenoh topic.
//!
//! # Data flow
//!
//! ```text
//! Supervisor (per source) -> FrameBuffer -> FrameDecoder -> Registry
//!     -> FallbackCache -> mpsc queue -> forwarder -> Zenoh
//! ```
//!
//! # Key Expression Format
//!
//! Values are published verbatim to the topic of their parameter:
//! ```text
//! hmi/pcm/battery_soc          -> "100.0"
//! hmi/pcm/hv_battery_pack_temp -> "20"
//! ```
//!
//! Bridge status goes to `{key_prefix}/@/status`.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod events;
pub mod forwarder;
pub mod pipeline;
pub mod registry;
pub mod supervisor;
pub mod validation;

pub use codec::{Frame, FrameDecoder, FrameError, ParameterId, RawValue, ValueEncoding};
pub use config::{ConnectionConfig, SourceConfig, TelemetryBridgeConfig, TelemetryConfig};
pub use events::{NoopEvents, PipelineEvents, PipelineStats, TracingEvents};
pub use pipeline::{FramePipeline, Forward, Outcome};
pub use registry::{ParameterDescriptor, Registry, RegistryError, Resolution};
pub use supervisor::{ConnectionState, DisconnectReason, Supervisor, Transport};
pub use validation::{FallbackCache, SharedCache, ValidRange, Verdict};
