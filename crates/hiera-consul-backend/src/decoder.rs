//! Decoding of Consul answers into lookup values
//!
//! Consul answers every KV or catalog query with a JSON array. KV entries carry
//! a base64 `Value` field; catalog entries are structured node/service records
//! and are handed back untouched.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::resolution::ResolutionType;

/// Decode a response body, degrading any decode failure to the empty
/// container for `resolution` (or absence for scalar lookups).
pub fn decode(body: &[u8], resolution: ResolutionType) -> Option<Value> {
    match try_decode(body, resolution) {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Could not decode Consul answer: {}", e);
            resolution.empty_container()
        }
    }
}

/// Decode a response body. `Ok(None)` means Consul had nothing for the key.
///
/// Array and hash lookups fold every entry; tombstones become `null`.
pub fn try_decode(
    body: &[u8],
    resolution: ResolutionType,
) -> Result<Option<Value>, DecodeError> {
    if body.trim_ascii() == b"null" {
        debug!("Consul answered null, skipping");
        return Ok(None);
    }

    let parsed: Value = serde_json::from_slice(body)?;
    let entries = match &parsed {
        Value::Array(entries) => entries,
        Value::Null => return Ok(None),
        // Catalog listings such as /v1/catalog/services are objects.
        _ => return Ok(Some(parsed)),
    };

    let Some(first) = entries.first() else {
        debug!("Consul answered an empty array, skipping");
        return Ok(None);
    };

    if first.get("Value").is_none() {
        return Ok(Some(parsed));
    }

    match resolution {
        ResolutionType::Scalar => decode_entry(first),
        ResolutionType::Array => {
            let mut values = Vec::with_capacity(entries.len());
            for entry in entries {
                values.push(decode_entry(entry)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(values)))
        }
        ResolutionType::Hash => {
            let mut map = Map::new();
            for entry in entries {
                let Some(key) = entry.get("Key").and_then(Value::as_str) else {
                    continue;
                };
                let value = decode_entry(entry)?.unwrap_or(Value::Null);
                map.insert(key.to_string(), value);
            }
            if map.is_empty() {
                return Ok(None);
            }
            Ok(Some(Value::Object(map)))
        }
    }
}

/// Decode the `Value` of a single KV entry. A null value is a tombstone.
fn decode_entry(entry: &Value) -> Result<Option<Value>, DecodeError> {
    let key = || {
        entry
            .get("Key")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string()
    };

    match entry.get("Value") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(encoded)) => {
            let bytes = BASE64
                .decode(encoded.trim())
                .map_err(|source| DecodeError::Base64 { key: key(), source })?;
            let text = String::from_utf8(bytes).map_err(|_| DecodeError::Utf8 { key: key() })?;
            Ok(Some(Value::String(text)))
        }
        Some(other) => Err(DecodeError::Shape {
            key: key(),
            found: other.to_string(),
        }),
    }
}

/// Whether a decoded value counts as an answer for first-match-wins.
pub fn is_answer(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}
