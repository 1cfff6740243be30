//! Ordered field probing over loosely-typed backend payloads.
//!
//! The backend is free to rename, nest or re-encode any field, so every read
//! goes through a list of [`Path`] accessors tried in order. Each accessor
//! returns `None` on a missing segment, a non-object parent or a JSON `null`.

use serde_json::Value;

/// A chain of object keys leading to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Path(pub &'static [&'static str]);

impl Path {
    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(value, |current, segment| current.as_object()?.get(*segment))
            .filter(|found| !found.is_null())
    }
}

/// First accessor that reaches a non-null value.
pub fn first_present<'a>(value: &'a Value, paths: &[Path]) -> Option<&'a Value> {
    paths.iter().find_map(|path| path.get(value))
}

/// First accessor whose value coerces to non-empty text.
pub fn first_text(value: &Value, paths: &[Path]) -> Option<String> {
    paths.iter().find_map(|path| path.get(value).and_then(text))
}

/// First accessor whose value coerces to a count.
pub fn first_count(value: &Value, paths: &[Path]) -> Option<u64> {
    paths.iter().find_map(|path| path.get(value).and_then(count))
}

/// Strings (trimmed, non-empty) and numbers are text; everything else is not.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Non-negative integers, floats (floored) and numeric strings.
pub fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Backends wrap payloads in `{ "data": { ... } }` inconsistently.
pub fn unwrap_envelope(value: &Value) -> &Value {
    match value.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => value,
    }
}
