//! Integration tests for hmi-common library.

use hmi_common::serialization::parse_text_value;
use hmi_common::{
    Format, TelemetryRecord, TelemetryValue, decode, encode, status_key, validate_topic,
};

#[test]
fn test_record_in_every_format() {
    let record = TelemetryRecord::new("pcm", "temperature", 20i64).with_fallback(true);

    // Text carries only the value
    let text = encode(&record, Format::Text).expect("Text encode failed");
    assert_eq!(text, b"20");
    assert_eq!(
        parse_text_value(&text).expect("Text parse failed"),
        TelemetryValue::Integer(20)
    );

    // JSON carries the whole record
    let json = encode(&record, Format::Json).expect("JSON encode failed");
    let decoded = decode(&json, Format::Json).expect("JSON decode failed");
    assert_eq!(decoded.source, "pcm");
    assert_eq!(decoded.parameter, "temperature");
    assert_eq!(decoded.value, TelemetryValue::Integer(20));
    assert!(decoded.fallback);

    // CBOR is smaller than JSON
    let cbor = encode(&record, Format::Cbor).expect("CBOR encode failed");
    assert!(cbor.len() < json.len(), "CBOR should be smaller than JSON");
    let decoded = decode(&cbor, Format::Cbor).expect("CBOR decode failed");
    assert_eq!(decoded, record);
}

#[test]
fn test_float_text_keeps_trailing_zero() {
    let values = [(100.0f32, "100.0"), (23.5, "23.5"), (0.0, "0.0"), (-40.25, "-40.25")];

    for (value, expected) in values {
        let record = TelemetryRecord::new("pcm", "battery_soc", value);
        let payload = encode(&record, Format::Text).unwrap();
        assert_eq!(std::str::from_utf8(&payload).unwrap(), expected);
    }
}

#[test]
fn test_status_key_is_a_valid_topic_prefix() {
    let key = status_key("hmi/telemetry");
    assert_eq!(key, "hmi/telemetry/@/status");
    assert!(validate_topic("hmi/telemetry").is_ok());
}
