//! Structured values for tool arguments and results.
//!
//! [`Value`] is `serde_json::Value` built with `preserve_order`, so objects
//! keep insertion order and keys stay unique. [`ValueExt`] adds checked
//! accessors that report a [`ValueError`] instead of silently yielding
//! `None` or a default.
//!
//! [`decode_string_list`] is the tolerant decoder used on backend payloads:
//! anything that is not a JSON array of strings becomes an empty list.

use crate::error::ValueError;
use serde::de::DeserializeOwned;
use tracing::warn;

pub use serde_json::{Map, Number, Value, json};

/// Parse JSON text into a [`Value`].
pub fn parse(text: &str) -> Result<Value, ValueError> {
    serde_json::from_str(text).map_err(|e| ValueError::Parse(e.to_string()))
}

/// Serialize a [`Value`] to compact JSON text.
///
/// `parse(&serialize(v)) == v` for every value.
pub fn serialize(value: &Value) -> String {
    value.to_string()
}

/// Name of the JSON type of `value`, for diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(expected: &'static str, found: &Value) -> ValueError {
    ValueError::TypeMismatch {
        expected,
        found: type_name(found),
    }
}

/// Checked accessors for [`Value`].
pub trait ValueExt {
    fn try_str(&self) -> Result<&str, ValueError>;
    fn try_bool(&self) -> Result<bool, ValueError>;
    fn try_i64(&self) -> Result<i64, ValueError>;
    fn try_f64(&self) -> Result<f64, ValueError>;
    fn try_array(&self) -> Result<&Vec<Value>, ValueError>;
    fn try_object(&self) -> Result<&Map<String, Value>, ValueError>;

    /// Look up `key` in an object.
    fn try_key(&self, key: &str) -> Result<&Value, ValueError>;

    /// Index into an array.
    fn try_index(&self, index: usize) -> Result<&Value, ValueError>;

    /// Deserialize into any `serde` type.
    fn try_get<T: DeserializeOwned>(&self) -> Result<T, ValueError>;

    /// Shorthand for `try_key(key)?.try_str()`.
    fn str_field(&self, key: &str) -> Result<&str, ValueError> {
        self.try_key(key)?.try_str()
    }
}

impl ValueExt for Value {
    fn try_str(&self) -> Result<&str, ValueError> {
        self.as_str().ok_or_else(|| mismatch("string", self))
    }

    fn try_bool(&self) -> Result<bool, ValueError> {
        self.as_bool().ok_or_else(|| mismatch("bool", self))
    }

    fn try_i64(&self) -> Result<i64, ValueError> {
        self.as_i64().ok_or_else(|| mismatch("integer", self))
    }

    fn try_f64(&self) -> Result<f64, ValueError> {
        self.as_f64().ok_or_else(|| mismatch("number", self))
    }

    fn try_array(&self) -> Result<&Vec<Value>, ValueError> {
        self.as_array().ok_or_else(|| mismatch("array", self))
    }

    fn try_object(&self) -> Result<&Map<String, Value>, ValueError> {
        self.as_object().ok_or_else(|| mismatch("object", self))
    }

    fn try_key(&self, key: &str) -> Result<&Value, ValueError> {
        self.try_object()?
            .get(key)
            .ok_or_else(|| ValueError::KeyNotFound(key.to_string()))
    }

    fn try_index(&self, index: usize) -> Result<&Value, ValueError> {
        let items = self.try_array()?;
        items.get(index).ok_or(ValueError::IndexOutOfBounds {
            index,
            len: items.len(),
        })
    }

    fn try_get<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        serde_json::from_value(self.clone()).map_err(|_| mismatch(std::any::type_name::<T>(), self))
    }
}

/// Decode a JSON array of strings, returning an empty list on any failure.
///
/// Malformed text, a non-array document, or a non-string element are all
/// logged and mapped to `[]`. Callers never see an error.
pub fn decode_string_list(payload: &str) -> Vec<String> {
    match try_decode_string_list(payload) {
        Ok(items) => items,
        Err(e) => {
            let preview: String = payload.chars().take(120).collect();
            warn!("Failed to decode string list from '{preview}': {e}");
            Vec::new()
        }
    }
}

fn try_decode_string_list(payload: &str) -> Result<Vec<String>, ValueError> {
    parse(payload)?
        .try_array()?
        .iter()
        .map(|item| item.try_str().map(str::to_string))
        .collect()
}
