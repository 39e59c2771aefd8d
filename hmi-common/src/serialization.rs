use crate::error::{Error, Result};
use crate::telemetry::{TelemetryRecord, TelemetryValue};

/// Payload format for published telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Bare stringified number (what dashboards subscribe to).
    #[default]
    Text,

    /// JSON record (human-readable, good for debugging).
    Json,

    /// CBOR record (compact binary).
    Cbor,
}

impl Format {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Text => "text/plain",
            Format::Json => "application/json",
            Format::Cbor => "application/cbor",
        }
    }

    /// Get the lowercase name used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Json => "json",
            Format::Cbor => "cbor",
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode a record into a bus payload.
pub fn encode(record: &TelemetryRecord, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Text => Ok(record.value.to_string().into_bytes()),
        Format::Json => serde_json::to_vec(record).map_err(|e| Error::encode(format, e)),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(record, &mut buf).map_err(|e| Error::encode(format, e))?;
            Ok(buf)
        }
    }
}

/// Decode a JSON or CBOR payload back into a record.
///
/// Text payloads only carry the value; use [`parse_text_value`] for those.
pub fn decode(data: &[u8], format: Format) -> Result<TelemetryRecord> {
    match format {
        Format::Text => Err(Error::decode(
            format,
            "text payloads carry only the value, not a record",
        )),
        Format::Json => serde_json::from_slice(data).map_err(|e| Error::decode(format, e)),
        Format::Cbor => ciborium::from_reader(data).map_err(|e| Error::decode(format, e)),
    }
}

/// Parse a text payload. Integers stay integers, anything else is a float.
pub fn parse_text_value(data: &[u8]) -> Result<TelemetryValue> {
    let text = std::str::from_utf8(data).map_err(|e| Error::decode(Format::Text, e))?;
    let text = text.trim();

    if let Ok(v) = text.parse::<i64>() {
        return Ok(TelemetryValue::Integer(v));
    }

    text.parse::<f32>()
        .map(TelemetryValue::Float)
        .map_err(|e| Error::decode(Format::Text, format!("'{}': {}", text, e)))
}
