//! Loosely-typed submitted data.
//!
//! A [`Submission`] is the single entry point for everything a caller sends:
//! form-encoded bodies, JSON bodies and entries of imported documents. It only
//! reshapes keys; interpreting values is the job of [`crate::normalize`].

use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationKind};

/// Suffix marking a form key that may repeat
const LIST_SUFFIX: &str = "[]";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    fields: Map<String, Value>,
}

impl Submission {
    /// Collect form pairs. Keys ending in `[]` accumulate into an ordered list
    /// under the base key; other keys keep their last value.
    pub fn from_form_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut fields = Map::new();

        for (key, value) in pairs {
            match key.strip_suffix(LIST_SUFFIX) {
                Some(base) => {
                    let entry = fields
                        .entry(base.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    match entry {
                        Value::Array(items) => items.push(Value::String(value)),
                        // a scalar with the same base key came first
                        other => {
                            let previous = other.take();
                            *other = Value::Array(vec![previous, Value::String(value)]);
                        }
                    }
                }
                None => {
                    fields.insert(key, Value::String(value));
                }
            }
        }

        Self { fields }
    }

    /// Parse an `application/x-www-form-urlencoded` body
    pub fn from_form_encoded(body: &[u8]) -> Result<Self, ValidationError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).map_err(|e| {
            ValidationError::new(
                "submission",
                ValidationKind::InvalidDocument,
                format!("Malformed form body: {e}"),
            )
        })?;
        Ok(Self::from_form_pairs(pairs))
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_json(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(ValidationError::new(
                "submission",
                ValidationKind::InvalidType,
                format!("Expected an object, got {}", json_type_name(&other)),
            )),
        }
    }

    /// Parse a JSON body
    pub fn from_json_slice(body: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            ValidationError::new(
                "submission",
                ValidationKind::InvalidJson,
                format!("Malformed JSON body: {e}"),
            )
        })?;
        Self::from_json(value)
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Field value, with JSON `null` treated as absent
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|value| !value.is_null())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
