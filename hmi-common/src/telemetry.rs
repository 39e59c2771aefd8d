use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single measurement forwarded to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Unix epoch milliseconds when the frame was processed.
    pub timestamp: i64,

    /// Name of the telemetry source the frame arrived on.
    pub source: String,

    /// Semantic parameter name (e.g., "battery_soc").
    pub parameter: String,

    /// The forwarded value.
    pub value: TelemetryValue,

    /// True when `value` is the last known good value substituted for a
    /// reading that failed validation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl TelemetryRecord {
    /// Create a new record with the current timestamp.
    pub fn new(
        source: impl Into<String>,
        parameter: impl Into<String>,
        value: impl Into<TelemetryValue>,
    ) -> Self {
        Self {
            timestamp: current_timestamp_millis(),
            source: source.into(),
            parameter: parameter.into(),
            value: value.into(),
            fallback: false,
        }
    }

    /// Mark this record as carrying a fallback value.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Numeric telemetry value.
///
/// Floats keep their single-precision origin so that the text rendering is the
/// shortest representation of the value that was on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TelemetryValue {
    /// Integer reading.
    Integer(i64),

    /// Single-precision float reading.
    Float(f32),
}

impl TelemetryValue {
    /// Value as `f64`, exact for every variant.
    pub fn as_f64(&self) -> f64 {
        match self {
            TelemetryValue::Integer(v) => *v as f64,
            TelemetryValue::Float(v) => f64::from(*v),
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Integer(v) => write!(f, "{}", v),
            // Debug keeps the trailing ".0" on integral floats ("100.0").
            TelemetryValue::Float(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<i64> for TelemetryValue {
    fn from(v: i64) -> Self {
        TelemetryValue::Integer(v)
    }
}

impl From<i32> for TelemetryValue {
    fn from(v: i32) -> Self {
        TelemetryValue::Integer(i64::from(v))
    }
}

impl From<f32> for TelemetryValue {
    fn from(v: f32) -> Self {
        TelemetryValue::Float(v)
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
