//! Fixed-width frame codec.
//!
//! A frame is `[1 byte identifier][W bytes value]`, big-endian, with no
//! delimiter: framing is purely byte-count driven. `W` is fixed per deployment
//! by the default [`ValueEncoding`]; individual identifiers may use a
//! different encoding of the same width.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use hmi_common::TelemetryValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-level parameter identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterId(pub u8);

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Value encodings seen across deployments of the data source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueEncoding {
    /// 4-byte IEEE-754 float (default)
    #[default]
    F32,
    /// 2-byte two's-complement integer
    I16,
    /// 4-byte two's-complement integer
    I32,
    /// 2-byte unsigned integer
    U16,
}

impl ValueEncoding {
    /// Number of value bytes on the wire.
    pub fn width(&self) -> usize {
        match self {
            ValueEncoding::F32 | ValueEncoding::I32 => 4,
            ValueEncoding::I16 | ValueEncoding::U16 => 2,
        }
    }

    /// Return the configuration name for this encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueEncoding::F32 => "f32",
            ValueEncoding::I16 => "i16",
            ValueEncoding::I32 => "i32",
            ValueEncoding::U16 => "u16",
        }
    }

    /// Decode exactly `width()` big-endian bytes.
    fn decode(&self, bytes: &[u8]) -> Result<RawValue, String> {
        let value = match self {
            ValueEncoding::F32 => {
                let v = f32::from_be_bytes(array(bytes)?);
                if !v.is_finite() {
                    return Err(format!("non-finite float {:?}", v));
                }
                RawValue::F32(v)
            }
            ValueEncoding::I16 => RawValue::I16(i16::from_be_bytes(array(bytes)?)),
            ValueEncoding::I32 => RawValue::I32(i32::from_be_bytes(array(bytes)?)),
            ValueEncoding::U16 => RawValue::U16(u16::from_be_bytes(array(bytes)?)),
        };
        Ok(value)
    }
}

impl fmt::Display for ValueEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "f32" => Ok(ValueEncoding::F32),
            "i16" => Ok(ValueEncoding::I16),
            "i32" => Ok(ValueEncoding::I32),
            "u16" => Ok(ValueEncoding::U16),
            other => Err(format!("unknown encoding '{}' (use f32, i16, i32 or u16)", other)),
        }
    }
}

fn array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], String> {
    bytes
        .try_into()
        .map_err(|_| format!("expected {} value bytes, got {}", N, bytes.len()))
}

/// A decoded value, typed by the encoding it arrived in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue {
    F32(f32),
    I16(i16),
    I32(i32),
    U16(u16),
}

impl RawValue {
    /// The value in the validation domain. Exact for every encoding.
    pub fn as_f64(&self) -> f64 {
        match self {
            RawValue::F32(v) => f64::from(*v),
            RawValue::I16(v) => f64::from(*v),
            RawValue::I32(v) => f64::from(*v),
            RawValue::U16(v) => f64::from(*v),
        }
    }

    /// The encoding this value travels in.
    pub fn encoding(&self) -> ValueEncoding {
        match self {
            RawValue::F32(_) => ValueEncoding::F32,
            RawValue::I16(_) => ValueEncoding::I16,
            RawValue::I32(_) => ValueEncoding::I32,
            RawValue::U16(_) => ValueEncoding::U16,
        }
    }

    /// Big-endian wire bytes.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            RawValue::F32(v) => v.to_be_bytes().to_vec(),
            RawValue::I16(v) => v.to_be_bytes().to_vec(),
            RawValue::I32(v) => v.to_be_bytes().to_vec(),
            RawValue::U16(v) => v.to_be_bytes().to_vec(),
        }
    }

    /// Parse a textual value in the given encoding ("100.0", "-7").
    pub fn parse(text: &str, encoding: ValueEncoding) -> Result<Self, String> {
        let text = text.trim();
        let parsed = match encoding {
            ValueEncoding::F32 => text.parse().map(RawValue::F32).map_err(|e| e.to_string()),
            ValueEncoding::I16 => text.parse().map(RawValue::I16).map_err(|e| e.to_string()),
            ValueEncoding::I32 => text.parse().map(RawValue::I32).map_err(|e| e.to_string()),
            ValueEncoding::U16 => text.parse().map(RawValue::U16).map_err(|e| e.to_string()),
        };
        parsed.map_err(|e| format!("'{}' is not a valid {}: {}", text, encoding, e))
    }
}

impl From<RawValue> for TelemetryValue {
    fn from(value: RawValue) -> Self {
        match value {
            RawValue::F32(v) => TelemetryValue::Float(v),
            RawValue::I16(v) => TelemetryValue::Integer(i64::from(v)),
            RawValue::I32(v) => TelemetryValue::Integer(i64::from(v)),
            RawValue::U16(v) => TelemetryValue::Integer(i64::from(v)),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        TelemetryValue::from(*self).fmt(f)
    }
}

/// One identifier + value record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub id: ParameterId,
    pub value: RawValue,
}

impl Frame {
    /// Wire representation of this frame.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.value.encoding().width());
        bytes.push(self.id.0);
        bytes.extend_from_slice(&self.value.to_be_bytes());
        bytes
    }
}

/// Errors produced while turning bytes into a [`Frame`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Wrong byte count: the transport is out of step with the frame boundaries.
    #[error("framing error: expected {expected} bytes, got {actual}")]
    Framing { expected: usize, actual: usize },

    /// Correctly sized frame whose value cannot be accepted.
    #[error("decode error for identifier {id}: {reason}")]
    Decode { id: ParameterId, reason: String },
}

impl FrameError {
    /// True for transport-level desynchronization rather than a bad payload.
    pub fn is_framing(&self) -> bool {
        matches!(self, FrameError::Framing { .. })
    }
}

/// A per-identifier encoding whose width differs from the deployment's frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "encoding {encoding} for identifier {id} is {} bytes wide, but frames carry {frame_width}-byte values",
    .encoding.width()
)]
pub struct WidthMismatch {
    pub id: ParameterId,
    pub encoding: ValueEncoding,
    pub frame_width: usize,
}

/// Pure frame decoder for one deployment's wire format.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    encoding: ValueEncoding,
    overrides: HashMap<ParameterId, ValueEncoding>,
}

impl FrameDecoder {
    /// Create a decoder where every identifier uses `encoding`.
    pub fn new(encoding: ValueEncoding) -> Self {
        Self {
            encoding,
            overrides: HashMap::new(),
        }
    }

    /// Decode `id` with a different encoding of the same width.
    pub fn with_override(
        mut self,
        id: ParameterId,
        encoding: ValueEncoding,
    ) -> Result<Self, WidthMismatch> {
        if encoding.width() != self.encoding.width() {
            return Err(WidthMismatch {
                id,
                encoding,
                frame_width: self.encoding.width(),
            });
        }
        self.overrides.insert(id, encoding);
        Ok(self)
    }

    /// The default encoding.
    pub fn encoding(&self) -> ValueEncoding {
        self.encoding
    }

    /// The encoding used for `id`.
    pub fn encoding_for(&self, id: ParameterId) -> ValueEncoding {
        self.overrides.get(&id).copied().unwrap_or(self.encoding)
    }

    /// Total frame size N = 1 + value width.
    pub fn frame_len(&self) -> usize {
        1 + self.encoding.width()
    }

    /// Decode exactly one frame.
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, FrameError> {
        let expected = self.frame_len();
        if bytes.len() != expected {
            return Err(FrameError::Framing {
                expected,
                actual: bytes.len(),
            });
        }

        let id = ParameterId(bytes[0]);
        let value = self
            .encoding_for(id)
            .decode(&bytes[1..])
            .map_err(|reason| FrameError::Decode { id, reason })?;

        Ok(Frame { id, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_f32_frame() {
        let decoder = FrameDecoder::new(ValueEncoding::F32);
        let frame = decoder.decode(&[0x01, 0x42, 0xC8, 0x00, 0x00]).unwrap();

        assert_eq!(frame.id, ParameterId(0x01));
        assert_eq!(frame.value, RawValue::F32(100.0));
        assert_eq!(frame.value.to_string(), "100.0");
    }

    #[test]
    fn test_decode_i16_frames() {
        let decoder = FrameDecoder::new(ValueEncoding::I16);

        let frame = decoder.decode(&[0x02, 0x00, 0x14]).unwrap();
        assert_eq!(frame.id, ParameterId(0x02));
        assert_eq!(frame.value, RawValue::I16(20));

        let frame = decoder.decode(&[0x02, 0xFF, 0xFE]).unwrap();
        assert_eq!(frame.value, RawValue::I16(-2));
    }

    #[test]
    fn test_decode_u16_and_i32() {
        let frame = FrameDecoder::new(ValueEncoding::U16)
            .decode(&[0x05, 0xFF, 0xFE])
            .unwrap();
        assert_eq!(frame.value, RawValue::U16(65534));

        let frame = FrameDecoder::new(ValueEncoding::I32)
            .decode(&[0x03, 0xFF, 0xFF, 0xFF, 0xD8])
            .unwrap();
        assert_eq!(frame.value, RawValue::I32(-40));
    }

    #[test]
    fn test_wrong_length_is_framing_error() {
        let decoder = FrameDecoder::new(ValueEncoding::F32);

        for len in [0usize, 1, 4, 6, 10] {
            let err = decoder.decode(&vec![0u8; len]).unwrap_err();
            assert_eq!(
                err,
                FrameError::Framing {
                    expected: 5,
                    actual: len
                }
            );
            assert!(err.is_framing());
        }
    }

    #[test]
    fn test_non_finite_float_is_decode_error() {
        let decoder = FrameDecoder::new(ValueEncoding::F32);

        let nan = decoder.decode(&[0x01, 0x7F, 0xC0, 0x00, 0x00]).unwrap_err();
        assert!(matches!(nan, FrameError::Decode { id: ParameterId(0x01), .. }));
        assert!(!nan.is_framing());

        let inf = decoder.decode(&[0x01, 0x7F, 0x80, 0x00, 0x00]).unwrap_err();
        assert!(matches!(inf, FrameError::Decode { .. }));
    }

    #[test]
    fn test_decode_is_pure() {
        let decoder = FrameDecoder::new(ValueEncoding::F32);
        let bytes = [0x03, 0x41, 0xBC, 0x00, 0x00];

        let first = decoder.decode(&bytes).unwrap();
        let second = decoder.decode(&bytes).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.value, RawValue::F32(23.5));
    }

    #[test]
    fn test_per_identifier_override() {
        let decoder = FrameDecoder::new(ValueEncoding::F32)
            .with_override(ParameterId(0x05), ValueEncoding::I32)
            .unwrap();

        assert_eq!(decoder.frame_len(), 5);
        assert_eq!(decoder.encoding_for(ParameterId(0x05)), ValueEncoding::I32);
        assert_eq!(decoder.encoding_for(ParameterId(0x01)), ValueEncoding::F32);

        let frame = decoder.decode(&[0x05, 0x00, 0x00, 0x00, 0x02]).unwrap();
        assert_eq!(frame.value, RawValue::I32(2));
    }

    #[test]
    fn test_override_width_mismatch() {
        let err = FrameDecoder::new(ValueEncoding::F32)
            .with_override(ParameterId(0x02), ValueEncoding::I16)
            .unwrap_err();

        assert_eq!(err.frame_width, 4);
        assert!(err.to_string().contains("0x02"));
    }

    #[test]
    fn test_frame_bytes() {
        let frame = Frame {
            id: ParameterId(0x02),
            value: RawValue::I16(50),
        };
        assert_eq!(frame.to_bytes(), vec![0x02, 0x00, 0x32]);
    }

    #[test]
    fn test_parse_raw_value() {
        assert_eq!(RawValue::parse("100.0", ValueEncoding::F32), Ok(RawValue::F32(100.0)));
        assert_eq!(RawValue::parse(" -7 ", ValueEncoding::I16), Ok(RawValue::I16(-7)));
        assert!(RawValue::parse("70000", ValueEncoding::I16).is_err());
        assert!(RawValue::parse("-1", ValueEncoding::U16).is_err());
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!(ValueEncoding::default(), ValueEncoding::F32);
        assert_eq!(ValueEncoding::I16.as_str(), "i16");
        assert_eq!(ValueEncoding::U16.width(), 2);
        assert_eq!(ParameterId(0x0A).to_string(), "0x0A");
        assert_eq!("I32".parse::<ValueEncoding>(), Ok(ValueEncoding::I32));
        assert!("f64".parse::<ValueEncoding>().is_err());
    }
}
