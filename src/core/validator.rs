// Normalizes decoded JSON payloads into readings

use crate::core::error::{FeedError, Result};
use crate::core::reading::{Reading, ReadingId, Timestamp};
use serde_json::{Map, Value};

/// Turns one decoded payload into a batch of readings.
///
/// A bare object is a one-element batch. Anything that is not an object or an
/// array made only of objects is rejected as a whole; missing or malformed
/// optional fields never are.
pub fn validate_payload(payload: &Value) -> Result<Vec<Reading>> {
    match payload {
        Value::Object(fields) => Ok(vec![normalize_record(fields)]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(fields) => Ok(normalize_record(fields)),
                other => Err(FeedError::Shape(format!(
                    "element {} is {}, expected an object",
                    index,
                    json_kind(other)
                ))),
            })
            .collect(),
        other => Err(FeedError::Shape(format!(
            "payload is {}, expected an object or an array of objects",
            json_kind(other)
        ))),
    }
}

fn normalize_record(fields: &Map<String, Value>) -> Reading {
    Reading {
        id: fields.get("id").and_then(parse_id),
        timestamp: fields
            .get("timestamp")
            .map(parse_timestamp)
            .unwrap_or(Timestamp::Unknown),
        temperature: fields.get("temperature").and_then(parse_finite),
        humidity: fields.get("humidity").and_then(parse_finite),
        sensor: fields.get("sensor").and_then(parse_tag),
        device: fields.get("device").and_then(parse_tag),
    }
}

fn parse_id(value: &Value) -> Option<ReadingId> {
    match value {
        Value::String(s) => Some(ReadingId::Text(s.clone())),
        Value::Number(n) => Some(ReadingId::Number(n.clone())),
        Value::Bool(b) => Some(ReadingId::Bool(*b)),
        _ => None,
    }
}

/// Numbers and numeric strings count; absent, null, and non-finite do not.
fn parse_finite(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn parse_timestamp(value: &Value) -> Timestamp {
    if let Some(secs) = parse_finite(value) {
        return Timestamp::Epoch(secs);
    }
    match value {
        Value::String(s) if !s.trim().is_empty() => Timestamp::Display(s.clone()),
        _ => Timestamp::Unknown,
    }
}

fn parse_tag(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_object_is_single_batch() {
        let batch = validate_payload(&json!({
            "id": 1, "temperature": 24.5, "humidity": 55.0, "timestamp": 1700000000
        }))
        .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].temperature, Some(24.5));
        assert_eq!(batch[0].timestamp, Timestamp::Epoch(1_700_000_000.0));
    }

    #[test]
    fn test_array_of_objects() {
        let batch = validate_payload(&json!([
            {"id": 1, "temperature": 24.5},
            {"id": "b", "humidity": 40}
        ]))
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].id, Some(ReadingId::Text("b".into())));
        assert_eq!(batch[1].humidity, Some(40.0));
    }

    #[test]
    fn test_empty_array_is_empty_batch() {
        assert!(validate_payload(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_payload_rejected() {
        for payload in [json!(42), json!("hello"), json!(null), json!(true)] {
            assert!(matches!(validate_payload(&payload), Err(FeedError::Shape(_))));
        }
    }

    #[test]
    fn test_array_with_non_object_rejected_whole() {
        let err = validate_payload(&json!([{"id": 1}, 5])).unwrap_err();
        match err {
            FeedError::Shape(msg) => assert!(msg.contains("element 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_absent_stays_distinct_from_zero() {
        let batch = validate_payload(&json!([
            {"temperature": 0.0, "humidity": null},
            {"temperature": "warm", "humidity": "NaN"}
        ]))
        .unwrap();
        assert_eq!(batch[0].temperature, Some(0.0));
        assert_eq!(batch[0].humidity, None);
        assert_eq!(batch[1].temperature, None);
        assert_eq!(batch[1].humidity, None);
        assert!(batch[1].is_heartbeat());
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let batch = validate_payload(&json!({"temperature": " 21.25 ", "timestamp": "1700000000"})).unwrap();
        assert_eq!(batch[0].temperature, Some(21.25));
        assert_eq!(batch[0].timestamp, Timestamp::Epoch(1_700_000_000.0));
    }

    #[test]
    fn test_display_timestamp_kept_as_text() {
        let batch = validate_payload(&json!([{"timestamp": "12:30:45"}, {"timestamp": ""}, {}])).unwrap();
        assert_eq!(batch[0].timestamp, Timestamp::Display("12:30:45".into()));
        assert_eq!(batch[1].timestamp, Timestamp::Unknown);
        assert_eq!(batch[2].timestamp, Timestamp::Unknown);
    }

    #[test]
    fn test_tags_passed_through_and_unknown_fields_ignored() {
        let batch = validate_payload(&json!({
            "sensor": "AHT20", "device": "ESP32", "rssi": -60, "firmware": {"v": 2}
        }))
        .unwrap();
        assert_eq!(batch[0].sensor.as_deref(), Some("AHT20"));
        assert_eq!(batch[0].device.as_deref(), Some("ESP32"));
    }

    #[test]
    fn test_null_id_is_absent() {
        let batch = validate_payload(&json!({"id": null})).unwrap();
        assert_eq!(batch[0].id, None);
    }
}
