//! JSON transcoding: convert loaded YAML values to JSON text.
//!
//! Mapping from YAML to JSON:
//!   - null               -> null
//!   - bool               -> true / false
//!   - int                -> number (fails beyond the 64-bit range)
//!   - float              -> number (fails on .nan, .inf and -.inf)
//!   - str, timestamp     -> string
//!   - !!binary           -> string (base64)
//!   - seq, !!set         -> array
//!   - map, !!omap        -> object (scalar keys only)
//!   - any other tag      -> the tagged value, tag dropped

use base64::prelude::*;
use librtyaml::Value;
use num_traits::ToPrimitive;
use serde_json::{Map, Number};

/// Encode a value as pretty-printed JSON.
pub fn encode(value: &Value) -> Result<String, String> {
    let json = value_to_json(value)?;
    serde_json::to_string_pretty(&json).map_err(|e| format!("JSON encode error: {}", e))
}

/// Encode a stream: one document is a single JSON text, several become an
/// array.
pub fn encode_stream(values: &[Value]) -> Result<String, String> {
    match values {
        [single] => encode(single),
        _ => {
            let items = values.iter().map(value_to_json).collect::<Result<Vec<_>, _>>()?;
            serde_json::to_string_pretty(&serde_json::Value::Array(items))
                .map_err(|e| format!("JSON encode error: {}", e))
        }
    }
}

fn value_to_json(value: &Value) -> Result<serde_json::Value, String> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Int(n) => {
            if let Some(i) = n.to_i64() {
                Ok(serde_json::Value::Number(i.into()))
            } else if let Some(u) = n.to_u64() {
                Ok(serde_json::Value::Number(u.into()))
            } else {
                Err(format!("integer {} does not fit in a JSON number", n))
            }
        }
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| format!("float {} has no JSON representation", f)),
        Value::String(s) | Value::Timestamp(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Binary(bytes) => Ok(serde_json::Value::String(BASE64_STANDARD.encode(bytes))),
        Value::Sequence(seq) => seq.iter().map(value_to_json).collect::<Result<_, _>>().map(serde_json::Value::Array),
        Value::Set(set) => set.iter().map(value_to_json).collect::<Result<_, _>>().map(serde_json::Value::Array),
        Value::Mapping(map) => entries_to_json(map.iter()),
        Value::OrderedMap(map) => entries_to_json(map.iter()),
        Value::Tagged(tagged) => value_to_json(&tagged.value),
    }
}

fn entries_to_json<'v>(entries: impl Iterator<Item = (&'v Value, &'v Value)>) -> Result<serde_json::Value, String> {
    let mut object = Map::new();
    for (key, value) in entries {
        object.insert(key_to_string(key)?, value_to_json(value)?);
    }
    Ok(serde_json::Value::Object(object))
}

fn key_to_string(key: &Value) -> Result<String, String> {
    match key {
        Value::String(s) | Value::Timestamp(s) => Ok(s.clone()),
        Value::Int(n) => Ok(n.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok("null".to_string()),
        other => Err(format!("mapping key {:?} cannot be a JSON object key", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(input: &str) -> Value {
        librtyaml::safe_load(input).unwrap()
    }

    #[test]
    fn test_scalars_and_collections() {
        let value = load("a: 1\nb: [true, null, 2.5]\nc: text\n");
        let json: serde_json::Value = serde_json::from_str(&encode(&value).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"a": 1, "b": [true, null, 2.5], "c": "text"}));
    }

    #[test]
    fn test_binary_is_base64() {
        let value = load("!!binary aGVsbG8=\n");
        assert_eq!(encode(&value).unwrap(), "\"aGVsbG8=\"");
    }

    #[test]
    fn test_scalar_keys_become_strings() {
        let value = load("1: one\ntrue: yes\n");
        let json: serde_json::Value = serde_json::from_str(&encode(&value).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"1": "one", "true": "yes"}));
    }

    #[test]
    fn test_rejects_what_json_cannot_hold() {
        assert!(encode(&load(".nan")).is_err());
        assert!(encode(&load("99999999999999999999999")).is_err());
        let mut complex = librtyaml::Mapping::new();
        complex.insert(Value::from(vec![Value::from("a")]), "b");
        assert!(encode(&Value::from(complex)).is_err());
    }

    #[test]
    fn test_stream_of_documents_is_an_array() {
        let values = librtyaml::load_all("1\n--- 2\n", &librtyaml::Schema::default()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&encode_stream(&values).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!([1, 2]));
    }
}
