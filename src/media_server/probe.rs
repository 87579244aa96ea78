//! Ordered attribute probing over loosely-shaped server JSON.
//!
//! Session and rendition payloads differ between server versions and player
//! types. Each field is read through a list of JSON pointers tried in order;
//! a miss or a type mismatch moves on to the next pointer and never raises.

use serde_json::Value;

/// First pointer that resolves to a non-empty string or a number.
pub fn probe_str(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(scalar_to_string))
}

/// First pointer that resolves to a non-negative integer, either as a JSON
/// number or a numeric string.
pub fn probe_u64(value: &Value, pointers: &[&str]) -> Option<u64> {
    pointers
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(scalar_to_u64))
}

/// First pointer that resolves to a boolean, accepting `1`/`0` and
/// `"true"`/`"1"` style encodings.
pub fn probe_bool(value: &Value, pointers: &[&str]) -> Option<bool> {
    pointers
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(scalar_to_bool))
}

/// First pointer that resolves to an array.
pub fn probe_array<'a>(value: &'a Value, pointers: &[&str]) -> &'a [Value] {
    pointers
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(Value::as_array))
        .map_or(&[], Vec::as_slice)
}

/// Try each extractor in order until one yields a value.
pub fn first_of<T>(value: &Value, extractors: &[fn(&Value) -> Option<T>]) -> Option<T> {
    extractors.iter().find_map(|extract| extract(value))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn scalar_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
