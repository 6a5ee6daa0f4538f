//! Canonical endpoint records.
//!
//! Everything in this module is already validated: values only reach these
//! types through [`crate::normalize`], so the scheduler and the registry never
//! re-check them.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Default probe cadence in minutes
pub const DEFAULT_INTERVAL_MINUTES: u32 = 5;

/// Default expected HTTP status code
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Default probe deadline in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// HTTP method used by a probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    /// Any other RFC 7230 token, upper-cased
    Custom(String),
}

impl Method {
    /// Parse a method token, case-insensitively.
    ///
    /// Returns `None` for empty input or input containing characters that are
    /// not allowed in an HTTP token.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() || !token.chars().all(is_token_char) {
            return None;
        }

        let method = match token.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "PATCH" => Method::Patch,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            other => Method::Custom(other.to_string()),
        };
        Some(method)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Custom(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

/// Request headers in submission order.
///
/// Serialized as a JSON object. An empty set is never stored: the normalizer
/// turns it into `None` on the owning record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// Build a header set, returning `None` when there are no pairs.
    ///
    /// A repeated name keeps its first position and its last value.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Option<Self> {
        let mut headers: Vec<(String, String)> = Vec::new();
        for (name, value) in pairs {
            match headers.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
                Some(slot) => slot.1 = value,
                None => headers.push((name, value)),
            }
        }

        if headers.is_empty() { None } else { Some(Self(headers)) }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Request payload, passed to the transport unmodified.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured payload, sent as `application/json`
    Json(serde_json::Value),
    /// Raw text payload
    Text(String),
}

impl Serialize for RequestBody {
    // A text body is written as JSON text so that the exported document
    // normalizes back to the same value.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RequestBody::Json(value) => value.serialize(serializer),
            RequestBody::Text(text) => {
                let encoded = serde_json::to_string(text).map_err(serde::ser::Error::custom)?;
                serializer.serialize_str(&encoded)
            }
        }
    }
}

/// Assertion on a JSON value inside the response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonCheck {
    pub path: String,
    pub expected_value: String,
}

/// User-editable part of an endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointConfig {
    pub id: String,
    pub name: String,
    pub url: String,
    pub method: Method,
    pub interval_minutes: u32,
    pub enabled: bool,
    pub expected_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_check: Option<JsonCheck>,
    pub timeout_seconds: u64,
}

impl EndpointConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Health of an endpoint as last observed by the scheduler
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Ok,
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Ok => write!(f, "ok"),
            HealthStatus::Error => write!(f, "error"),
        }
    }
}

/// Why a probe failed. The first failing stage wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    StatusMismatch,
    ContentMismatch,
    JsonInvalid,
    JsonPathNotFound,
    JsonValueMismatch,
    NetworkError,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::StatusMismatch => "status_mismatch",
            FailureReason::ContentMismatch => "content_mismatch",
            FailureReason::JsonInvalid => "json_invalid",
            FailureReason::JsonPathNotFound => "json_path_not_found",
            FailureReason::JsonValueMismatch => "json_value_mismatch",
            FailureReason::NetworkError => "network_error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one probe, before it is written back to the registry
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: HealthStatus,
    pub reason: Option<FailureReason>,
    pub http_status: Option<u16>,
    pub latency_ms: Option<u64>,
    pub detail: String,
}

impl ProbeOutcome {
    pub fn ok(http_status: u16, latency_ms: u64) -> Self {
        Self {
            status: HealthStatus::Ok,
            reason: None,
            http_status: Some(http_status),
            latency_ms: Some(latency_ms),
            detail: format!("HTTP {http_status} in {latency_ms} ms"),
        }
    }

    pub fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            reason: Some(reason),
            http_status: None,
            latency_ms: None,
            detail: detail.into(),
        }
    }

    /// Attach response metadata to a failure
    pub fn with_response(mut self, http_status: u16, latency_ms: u64) -> Self {
        self.http_status = Some(http_status);
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// One entry of an endpoint's probe history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeRecord {
    pub checked_at: DateTime<Utc>,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub detail: String,
}

/// Scheduler-owned part of an endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Health {
    pub status: HealthStatus,
    pub last_check: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// A complete endpoint record as seen by API callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    #[serde(flatten)]
    pub config: EndpointConfig,
    #[serde(flatten)]
    pub health: Health,
}

impl Endpoint {
    pub fn id(&self) -> &str {
        &self.config.id
    }
}

/// Emitted once for every completed probe that was written back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    pub id: String,
    pub name: String,
    pub url: String,
    pub previous: HealthStatus,
    pub current: HealthStatus,
    pub reason: Option<FailureReason>,
    pub detail: String,
    pub checked_at: DateTime<Utc>,
}

impl StatusEvent {
    /// Whether this event is a status transition: entering `error`, or
    /// recovering from `error` to `ok`.
    pub fn is_transition(&self) -> bool {
        match (self.previous, self.current) {
            (HealthStatus::Error, HealthStatus::Ok) => true,
            (previous, HealthStatus::Error) => previous != HealthStatus::Error,
            _ => false,
        }
    }
}
