//! Small helpers for working with API responses.

use crate::transport::Response;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Walk a dot-separated `path` through nested objects and arrays.
///
/// Numeric segments index arrays (and are also tried as object keys).
/// Returns `None` when any segment is missing.
pub fn get_value<'a>(path: &str, value: &'a Value) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

/// First element of an array, or the value itself for anything else.
pub fn first(value: &Value) -> &Value {
    match value {
        Value::Array(items) if !items.is_empty() => &items[0],
        other => other,
    }
}

/// Render `value` with sorted keys and four-space indentation.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let value = sorted(serde_json::to_value(value)?);
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// Maps keep insertion order, so keys are sorted explicitly.
fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, nested)| (key, sorted(nested)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

pub fn print_json(value: &Value) -> serde_json::Result<()> {
    println!("{}", to_pretty_json(value)?);
    Ok(())
}

/// Print a response body; empty bodies print nothing.
pub fn print_response(response: &Response) -> serde_json::Result<()> {
    match &response.json {
        Some(body) => print_json(body),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn get_value_walks_objects_and_arrays() {
        let doc = json!({"a": {"b": [{"c": 1}, {"c": 2}]}});
        assert_eq!(get_value("a.b.1.c", &doc), Some(&json!(2)));
        assert_eq!(get_value("a.b.5.c", &doc), None);
        assert_eq!(get_value("a.x", &doc), None);
        assert_eq!(get_value("a.b.0.c.d", &doc), None);
    }

    #[test]
    fn numeric_segments_work_as_object_keys() {
        let doc = json!({"404": {"message": "missing"}});
        assert_eq!(get_value("404.message", &doc), Some(&json!("missing")));
    }

    #[test]
    fn first_unwraps_lists_only() {
        assert_eq!(first(&json!([3, 4])), &json!(3));
        assert_eq!(first(&json!([])), &json!([]));
        assert_eq!(first(&json!("x")), &json!("x"));
    }

    #[test]
    fn pretty_json_sorts_and_indents() {
        let rendered = to_pretty_json(&json!({"b": 1, "a": [true]})).unwrap();
        assert_eq!(rendered, "{\n    \"a\": [\n        true\n    ],\n    \"b\": 1\n}");

        let nested = to_pretty_json(&json!([{"z": {"y": 1, "x": 2}}])).unwrap();
        assert!(nested.find("\"x\"").unwrap() < nested.find("\"y\"").unwrap());
    }
}
