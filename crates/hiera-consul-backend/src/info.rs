//! Field extraction over lookup answers

use serde_json::Value;

/// Pull `field` out of a catalog answer.
///
/// A mapping yields its `field` (null when absent), a sequence yields the
/// `field` of every element, anything else yields `None`.
pub fn consul_info(data: &Value, field: &str) -> Option<Value> {
    match data {
        Value::Object(map) => Some(map.get(field).cloned().unwrap_or(Value::Null)),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .map(|item| item.get(field).cloned().unwrap_or(Value::Null))
                .collect(),
        )),
        _ => None,
    }
}
