//! HMI Bridge Framework
//!
//! Common plumbing for bridges that republish device telemetry on Zenoh.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Publisher`] for publishing telemetry records to Zenoh topics
//! - [`TelemetrySink`] as the publishing contract bridges program against
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`BridgeStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use hmi_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args)).await?;
//!
//!     // Spawn protocol-specific workers that stop on the shutdown signal
//!     let shutdown = runner.shutdown_signal();
//!     runner.spawn("poller", my_worker(runner.publisher(), shutdown));
//!
//!     // Run until Ctrl+C or SIGTERM
//!     runner.run_with_metadata(None).await
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{Publisher, TelemetrySink};
pub use runner::BridgeRunner;
pub use status::{BridgeState, BridgeStatus, StatusPublisher};

// Re-export commonly used types from hmi-common
pub use hmi_common::{
    Format, LogFormat, LoggingConfig, TelemetryRecord, TelemetryValue, ZenohConfig, ZenohMode,
};
