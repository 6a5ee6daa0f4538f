//! Locating values inside JSON response bodies.
//!
//! Paths are JSONPath expressions evaluated with `jsonpath_lib`. The leading
//! `$.` may be left out, so `result.stats[0].blockchain` and
//! `$.result.stats[0].blockchain` select the same value.

use jsonpath_lib::{select, JsonPathError};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("malformed path `{0}`: {1}")]
    Malformed(String, String),
}

/// A validated JSONPath expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    expression: String,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let raw = path.trim();
        let expression = match raw {
            "" | "$" | "$." => return Err(PathError::Empty),
            _ if raw.starts_with('$') => raw.to_string(),
            _ if raw.starts_with('[') => format!("${raw}"),
            _ => format!("$.{raw}"),
        };

        // syntax errors surface on any document, an empty one is enough
        if let Err(JsonPathError::Path(reason)) = select(&Value::Null, &expression) {
            return Err(PathError::Malformed(raw.to_string(), reason));
        }

        Ok(Self { expression })
    }

    /// First value the path selects. An empty selection, or a `null` value,
    /// counts as missing.
    pub fn locate<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        select(root, &self.expression).ok()?.into_iter().next().filter(|value| !value.is_null())
    }
}

/// String form used when comparing a located value with an expected value.
///
/// Strings compare by content, everything else by its JSON text.
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_and_locate() {
        let doc = json!({
            "result": {"stats": [{"blockchain": "eth"}, {"blockchain": "btc"}]},
            "matrix": [[1, 2], [3, 4]],
            "ready": true
        });

        let path = JsonPath::parse("result.stats[1].blockchain").unwrap();
        assert_eq!(path.locate(&doc), Some(&json!("btc")));

        let path = JsonPath::parse("$.result.stats[0].blockchain").unwrap();
        assert_eq!(path.locate(&doc), Some(&json!("eth")));

        let path = JsonPath::parse("$.matrix[1][0]").unwrap();
        assert_eq!(path.locate(&doc), Some(&json!(3)));

        let path = JsonPath::parse("ready").unwrap();
        assert_eq!(value_as_text(path.locate(&doc).unwrap()), "true");
    }

    #[test]
    fn test_missing_values() {
        let doc = json!({"a": {"b": null}, "list": [1]});

        assert_eq!(JsonPath::parse("a.b").unwrap().locate(&doc), None);
        assert_eq!(JsonPath::parse("a.c").unwrap().locate(&doc), None);
        assert_eq!(JsonPath::parse("list[3]").unwrap().locate(&doc), None);
        assert_eq!(JsonPath::parse("missing.deeper").unwrap().locate(&doc), None);
    }

    #[test]
    fn test_malformed_paths() {
        assert_eq!(JsonPath::parse("  "), Err(PathError::Empty));
        assert_eq!(JsonPath::parse("$"), Err(PathError::Empty));
        assert!(matches!(JsonPath::parse("a[1"), Err(PathError::Malformed(..))));
    }
}
