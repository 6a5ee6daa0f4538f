//! Submission normalization and validation.
//!
//! [`normalize_endpoint`] is the only way an [`EndpointConfig`] gets built from
//! caller input. It either returns a record that satisfies every invariant of
//! the model or a field-tagged [`ValidationError`]; it never touches the
//! registry, so a rejected submission cannot leave partial state behind.

use std::ops::RangeInclusive;

use serde_json::Value;
use url::Url;

use crate::error::{ValidationError, ValidationKind};
use crate::json_path::{value_as_text, JsonPath};
use crate::model::{
    EndpointConfig, Headers, JsonCheck, Method, RequestBody, DEFAULT_EXPECTED_STATUS,
    DEFAULT_INTERVAL_MINUTES, DEFAULT_TIMEOUT_SECONDS,
};
use crate::submission::{json_type_name, Submission};

const MAX_NAME_LEN: usize = 100;
const MAX_HEADERS: usize = 20;
const MAX_HEADER_SIZE: usize = 8192;
const MAX_BODY_SIZE: usize = 1024 * 1024;

const INTERVAL_RANGE: RangeInclusive<i64> = 1..=1440;
const STATUS_RANGE: RangeInclusive<i64> = 100..=599;
const TIMEOUT_RANGE: RangeInclusive<i64> = 1..=300;

/// Build a validated endpoint config from a submission
pub fn normalize_endpoint(submission: &Submission) -> Result<EndpointConfig, ValidationError> {
    let name = string_field(submission, "name")?.ok_or_else(|| ValidationError::required("name"))?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(
            "name",
            ValidationKind::OutOfRange,
            format!("Name too long (max {MAX_NAME_LEN} characters)"),
        ));
    }

    let id = match string_field(submission, "id")? {
        Some(id) => id,
        None => name.clone(),
    };
    if id.contains('/') || id.chars().any(char::is_control) {
        return Err(ValidationError::new(
            "id",
            ValidationKind::InvalidValue,
            "Identifier cannot contain '/' or control characters",
        ));
    }

    let url = string_field(submission, "url")?.ok_or_else(|| ValidationError::required("url"))?;
    validate_url("url", &url)?;

    let method = match string_field(submission, "method")? {
        Some(token) => Method::parse(&token).ok_or_else(|| {
            ValidationError::new(
                "method",
                ValidationKind::InvalidMethod,
                format!("Unsupported HTTP method: {token}"),
            )
        })?,
        None => Method::default(),
    };

    let interval_minutes =
        integer_field(submission, "interval_minutes", DEFAULT_INTERVAL_MINUTES.into(), INTERVAL_RANGE)?;
    let expected_status =
        integer_field(submission, "expected_status", DEFAULT_EXPECTED_STATUS.into(), STATUS_RANGE)?;

    // the settings panel submits `timeout`, stored documents use `timeout_seconds`
    let timeout_key = if submission.contains("timeout_seconds") { "timeout_seconds" } else { "timeout" };
    let timeout_seconds =
        integer_field(submission, timeout_key, DEFAULT_TIMEOUT_SECONDS as i64, TIMEOUT_RANGE)?;

    let enabled = bool_field(submission, "enabled", true);
    let expected_content = raw_string_field(submission, "expected_content")?;
    let headers = headers_field(submission.get("headers"))?;
    let body = body_field(submission.get("body"))?;
    let json_check = json_check_field(submission)?;

    Ok(EndpointConfig {
        id,
        name,
        url,
        method,
        // ranges above keep these conversions lossless
        interval_minutes: interval_minutes as u32,
        enabled,
        expected_status: expected_status as u16,
        expected_content,
        headers,
        body,
        json_check,
        timeout_seconds: timeout_seconds as u64,
    })
}

/// Normalize a multi-value field (`recipients`, `chat_ids`, ...) into an
/// ordered list of non-blank entries.
///
/// Accepts a native list or a newline-delimited string.
pub fn normalize_list(field: &str, value: Option<&Value>) -> Result<Vec<String>, ValidationError> {
    let entries = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => text.lines().map(str::to_string).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Null => Ok(String::new()),
                other => Err(invalid_type(field, "a list of strings", other)),
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Number(n)) => vec![n.to_string()],
        Some(other) => return Err(invalid_type(field, "a list or a newline-separated string", other)),
    };

    Ok(entries
        .into_iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect())
}

/// Normalize a header value given as a JSON object, a JSON string, or a list
/// of `Name: value` lines.
pub fn headers_field(value: Option<&Value>) -> Result<Option<Headers>, ValidationError> {
    let pairs = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => {
            if text.trim().is_empty() {
                return Ok(None);
            }
            let parsed: Value = serde_json::from_str(text).map_err(|e| {
                ValidationError::new(
                    "headers",
                    ValidationKind::InvalidJson,
                    format!("Headers must be valid JSON: {e}"),
                )
            })?;
            return match parsed {
                Value::String(_) => Err(invalid_type("headers", "an object", &parsed)),
                parsed => headers_field(Some(&parsed)),
            };
        }
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(name, value)| !name.trim().is_empty() && !value.is_null())
            .map(|(name, value)| (name.trim().to_string(), value_as_text(value)))
            .collect::<Vec<_>>(),
        Some(Value::Array(_)) => {
            let mut pairs = Vec::new();
            for line in normalize_list("headers", value)? {
                let (name, value) = line.split_once(':').ok_or_else(|| {
                    ValidationError::new(
                        "headers",
                        ValidationKind::InvalidValue,
                        format!("Header line must look like 'Name: value': {line}"),
                    )
                })?;
                if name.trim().is_empty() {
                    return Err(ValidationError::new(
                        "headers",
                        ValidationKind::InvalidValue,
                        format!("Header line has an empty name: {line}"),
                    ));
                }
                pairs.push((name.trim().to_string(), value.trim().to_string()));
            }
            pairs
        }
        Some(other) => return Err(invalid_type("headers", "an object", other)),
    };

    let headers = Headers::from_pairs(pairs);
    if let Some(headers) = &headers {
        validate_headers(headers)?;
    }
    Ok(headers)
}

fn validate_headers(headers: &Headers) -> Result<(), ValidationError> {
    if headers.len() > MAX_HEADERS {
        return Err(ValidationError::new(
            "headers",
            ValidationKind::OutOfRange,
            format!("Too many headers: {} (max: {MAX_HEADERS})", headers.len()),
        ));
    }

    for (name, value) in headers.iter() {
        if name.len() + value.len() > MAX_HEADER_SIZE {
            return Err(ValidationError::new(
                "headers",
                ValidationKind::OutOfRange,
                format!("Header {name} too large (max: {MAX_HEADER_SIZE} bytes)"),
            ));
        }
    }

    Ok(())
}

fn body_field(value: Option<&Value>) -> Result<Option<RequestBody>, ValidationError> {
    let body = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => {
            if text.trim().is_empty() {
                return Ok(None);
            }
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Null) => return Ok(None),
                Ok(Value::String(inner)) => RequestBody::Text(inner),
                Ok(parsed) => RequestBody::Json(parsed),
                Err(e) => {
                    return Err(ValidationError::new(
                        "body",
                        ValidationKind::InvalidJson,
                        format!("Body must be valid JSON: {e}"),
                    ));
                }
            }
        }
        Some(other) => RequestBody::Json(other.clone()),
    };

    let size = match &body {
        RequestBody::Text(text) => text.len(),
        RequestBody::Json(value) => value.to_string().len(),
    };
    if size > MAX_BODY_SIZE {
        return Err(ValidationError::new(
            "body",
            ValidationKind::OutOfRange,
            format!("Body too large: {size} bytes (max: {MAX_BODY_SIZE} bytes)"),
        ));
    }

    Ok(Some(body))
}

fn json_check_field(submission: &Submission) -> Result<Option<JsonCheck>, ValidationError> {
    let (path, expected) = match submission.get("json_check") {
        Some(Value::String(text)) if !text.trim().is_empty() => {
            let parsed: Value = serde_json::from_str(text).map_err(|e| {
                ValidationError::new(
                    "json_check",
                    ValidationKind::InvalidJson,
                    format!("JSON check must be valid JSON: {e}"),
                )
            })?;
            check_parts(&parsed)?
        }
        Some(Value::String(_)) => (None, None),
        Some(value @ Value::Object(_)) => check_parts(value)?,
        Some(other) => return Err(invalid_type("json_check", "an object", other)),
        None => (
            scalar_text("json_check_path", submission.get("json_check_path"))?,
            scalar_text("json_check_expected_value", submission.get("json_check_expected_value"))?,
        ),
    };

    let (Some(path), Some(expected_value)) = (path, expected) else {
        return Ok(None);
    };

    JsonPath::parse(&path).map_err(|e| {
        ValidationError::new("json_check.path", ValidationKind::InvalidValue, e.to_string())
    })?;

    Ok(Some(JsonCheck { path, expected_value }))
}

fn check_parts(value: &Value) -> Result<(Option<String>, Option<String>), ValidationError> {
    match value {
        Value::Object(map) => Ok((
            scalar_text("json_check.path", map.get("path"))?,
            scalar_text("json_check.expected_value", map.get("expected_value"))?,
        )),
        Value::Null => Ok((None, None)),
        other => Err(invalid_type("json_check", "an object", other)),
    }
}

pub(crate) fn validate_url(field: &str, target: &str) -> Result<(), ValidationError> {
    let invalid = |message: String| ValidationError::new(field, ValidationKind::InvalidUrl, message);

    match Url::parse(target) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme != "http" && scheme != "https" {
                return Err(invalid(format!("Invalid scheme '{scheme}'. Must be http or https")));
            }
            if url.host_str().is_none() {
                return Err(invalid("URL must have a valid host".to_string()));
            }
            Ok(())
        }
        Err(e) if !target.contains("://") => {
            Err(invalid(format!("URL must include scheme (http:// or https://): {e}")))
        }
        Err(e) => Err(invalid(format!("Invalid URL: {e}"))),
    }
}

/// Trimmed text of a scalar field; blank counts as absent
fn string_field(submission: &Submission, field: &str) -> Result<Option<String>, ValidationError> {
    scalar_text(field, submission.get(field))
}

pub(crate) fn scalar_text(field: &str, value: Option<&Value>) -> Result<Option<String>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(scalar.to_string())),
        Some(other) => Err(invalid_type(field, "a string", other)),
    }
}

/// Like [`string_field`] but keeps surrounding whitespace of non-blank text
fn raw_string_field(submission: &Submission, field: &str) -> Result<Option<String>, ValidationError> {
    match submission.get(field) {
        Some(Value::String(s)) => Ok((!s.trim().is_empty()).then(|| s.clone())),
        other => scalar_text(field, other),
    }
}

/// Parse an integer field. Missing or unparsable input falls back to
/// `default`; a parsed value outside `range` is rejected.
pub(crate) fn integer_field(
    submission: &Submission,
    field: &str,
    default: i64,
    range: RangeInclusive<i64>,
) -> Result<i64, ValidationError> {
    let parsed = match submission.get(field) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 1e15).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match parsed {
        None => Ok(default),
        Some(value) if range.contains(&value) => Ok(value),
        Some(value) => Err(ValidationError::new(
            field,
            ValidationKind::OutOfRange,
            format!(
                "{field} must be between {} and {}, got {value}",
                range.start(),
                range.end()
            ),
        )),
    }
}

/// Parse a boolean field, falling back to `default` on anything unrecognized
pub fn bool_field(submission: &Submission, field: &str, default: bool) -> bool {
    match submission.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map(|n| n != 0).unwrap_or(default),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" | "yes" => true,
            "false" | "off" | "0" | "no" => false,
            _ => default,
        },
        _ => default,
    }
}

pub(crate) fn invalid_type(field: &str, expected: &str, got: &Value) -> ValidationError {
    ValidationError::new(
        field,
        ValidationKind::InvalidType,
        format!("{field} must be {expected}, got {}", json_type_name(got)),
    )
}
