//! Persistence of the configuration document.
//!
//! The document holds the settings sections at the top level and the endpoint
//! list under `service_checks.endpoints`:
//!
//! ```json
//! {
//!   "general": { "app_name": "Vigil" },
//!   "notifications": { "notify_on_status": "transition", "email": { ... } },
//!   "service_checks": { "endpoints": [ { "id": "api", "url": "https://..." } ] }
//! }
//! ```
//!
//! Stores deal in raw JSON values; turning a value into validated records is
//! [`ConfigDocument::from_value`], which runs every entry through the same
//! normalizer as the API.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{StoreError, ValidationError, ValidationKind};
use crate::model::EndpointConfig;
use crate::normalize::normalize_endpoint;
use crate::settings::Settings;
use crate::submission::Submission;

const SERVICE_CHECKS: &str = "service_checks";
const ENDPOINTS: &str = "endpoints";

/// Serialization format of an imported or exported document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Yaml => "application/yaml",
        }
    }
}

/// A complete, validated configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    pub settings: Settings,
    pub endpoints: Vec<EndpointConfig>,
}

impl ConfigDocument {
    /// Validate a raw document.
    ///
    /// Endpoints are read from `service_checks.endpoints`, a top-level
    /// `endpoints` list, or a bare list. A missing list means no endpoints.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let (settings, entries) = match value {
            Value::Array(entries) => (Settings::default(), Some(entries)),
            Value::Object(tree) => {
                let entries = tree
                    .get(SERVICE_CHECKS)
                    .and_then(|checks| checks.get(ENDPOINTS))
                    .or_else(|| tree.get(ENDPOINTS))
                    .filter(|entries| !entries.is_null());
                let entries = match entries {
                    None => None,
                    Some(Value::Array(entries)) => Some(entries),
                    Some(_) => {
                        return Err(ValidationError::new(
                            ENDPOINTS,
                            ValidationKind::InvalidDocument,
                            "Endpoints must be a list",
                        ));
                    }
                };
                (Settings::from_value(value)?, entries)
            }
            _ => {
                return Err(ValidationError::new(
                    "document",
                    ValidationKind::InvalidDocument,
                    "Configuration document must be an object or a list of endpoints",
                ));
            }
        };

        let mut endpoints = Vec::new();
        let mut seen = HashSet::new();
        for (index, entry) in entries.into_iter().flatten().enumerate() {
            let submission = Submission::from_json(entry.clone()).map_err(|e| e.in_entry(index))?;
            let config = normalize_endpoint(&submission).map_err(|e| e.in_entry(index))?;
            if !seen.insert(config.id.clone()) {
                return Err(ValidationError::new(
                    "id",
                    ValidationKind::InvalidValue,
                    format!("Duplicate endpoint id '{}'", config.id),
                )
                .in_entry(index));
            }
            endpoints.push(config);
        }

        Ok(Self { settings, endpoints })
    }

    /// Parse and validate a serialized document
    pub fn parse(body: &[u8], format: Format) -> Result<Self, ValidationError> {
        let value: Value = match format {
            Format::Json => serde_json::from_slice(body).map_err(|e| {
                ValidationError::new("document", ValidationKind::InvalidJson, format!("Malformed JSON: {e}"))
            })?,
            Format::Yaml => serde_yaml::from_slice(body).map_err(|e| {
                ValidationError::new(
                    "document",
                    ValidationKind::InvalidDocument,
                    format!("Malformed YAML: {e}"),
                )
            })?,
        };
        Self::from_value(&value)
    }

    pub fn to_value(&self) -> Result<Value, StoreError> {
        let endpoints =
            serde_json::to_value(&self.endpoints).map_err(|e| StoreError::Serialize(e.to_string()))?;

        let mut checks = Map::new();
        checks.insert(ENDPOINTS.to_string(), endpoints);

        let mut tree = self.settings.as_map().clone();
        tree.insert(SERVICE_CHECKS.to_string(), Value::Object(checks));
        Ok(Value::Object(tree))
    }

    pub fn render(&self, format: Format) -> Result<String, StoreError> {
        let value = self.to_value()?;
        match format {
            Format::Json => serde_json::to_string_pretty(&value).map_err(|e| StoreError::Serialize(e.to_string())),
            Format::Yaml => serde_yaml::to_string(&value).map_err(|e| StoreError::Serialize(e.to_string())),
        }
    }
}

/// Durable storage for the raw configuration document
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    /// The stored document, or `None` if nothing was saved yet
    async fn load(&self) -> Result<Option<Value>, StoreError>;

    async fn save(&self, document: &Value) -> Result<(), StoreError>;
}

/// Pretty-printed JSON file, replaced atomically on save
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl ConfigStore for JsonFileStore {
    async fn load(&self) -> Result<Option<Value>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path: self.path.clone(), source }),
        };

        let value = serde_json::from_slice(&bytes).map_err(|e| StoreError::Parse(e.to_string()))?;
        debug!("loaded configuration from {}", self.path.display());
        Ok(Some(value))
    }

    async fn save(&self, document: &Value) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write { path: self.path.clone(), source };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let text = serde_json::to_string_pretty(document).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, text).await.map_err(write_err)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(write_err)?;

        info!("configuration saved to {}", self.path.display());
        Ok(())
    }
}

/// In-process store, for tests and ephemeral deployments
#[derive(Default)]
pub struct MemoryStore {
    document: Mutex<Option<Value>>,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: Value) -> Self {
        Self { document: Mutex::new(Some(document)), read_only: AtomicBool::new(false) }
    }

    /// Make every subsequent save fail
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }

    pub async fn document(&self) -> Option<Value> {
        self.document.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self) -> Result<Option<Value>, StoreError> {
        Ok(self.document.lock().await.clone())
    }

    async fn save(&self, document: &Value) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::Relaxed) {
            return Err(StoreError::Write {
                path: PathBuf::from("memory"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "store is read-only"),
            });
        }
        *self.document.lock().await = Some(document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RequestBody;
    use serde_json::json;

    #[test]
    fn test_document_shapes() {
        let entry = json!({"name": "api", "url": "https://api.example.com"});

        let nested = ConfigDocument::from_value(&json!({"service_checks": {"endpoints": [entry.clone()]}})).unwrap();
        let flat = ConfigDocument::from_value(&json!({"endpoints": [entry.clone()]})).unwrap();
        let bare = ConfigDocument::from_value(&json!([entry])).unwrap();

        assert_eq!(nested, flat);
        assert_eq!(flat, bare);
        assert_eq!(bare.endpoints[0].id, "api");

        assert!(ConfigDocument::from_value(&json!({})).unwrap().endpoints.is_empty());
        assert!(ConfigDocument::from_value(&json!("x")).is_err());
    }

    #[test]
    fn test_entry_errors_name_the_entry() {
        let document = json!({"endpoints": [
            {"name": "a", "url": "https://a.example.com"},
            {"name": "b", "url": "https://b.example.com", "interval_minutes": 0},
        ]});
        let err = ConfigDocument::from_value(&document).unwrap_err();
        assert_eq!(err.to_string(), "out_of_range:endpoints[1].interval_minutes");

        let document = json!({"endpoints": [
            {"name": "a", "url": "https://a.example.com"},
            {"name": "a", "url": "https://b.example.com"},
        ]});
        let err = ConfigDocument::from_value(&document).unwrap_err();
        assert_eq!(err.to_string(), "invalid_value:endpoints[1].id");
    }

    #[test]
    fn test_render_round_trip() {
        let document = ConfigDocument::from_value(&json!({"endpoints": [{
            "name": "api",
            "url": "https://api.example.com",
            "method": "post",
            "headers": {"X-Key": "1"},
            "body": "\"ping\"",
            "json_check": {"path": "status", "expected_value": "ok"},
        }]}))
        .unwrap();
        assert_eq!(document.endpoints[0].body, Some(RequestBody::Text("ping".to_string())));

        for format in [Format::Json, Format::Yaml] {
            let text = document.render(format).unwrap();
            let parsed = ConfigDocument::parse(text.as_bytes(), format).unwrap();
            assert_eq!(parsed, document);
        }
    }

    #[test]
    fn test_parse_errors() {
        let err = ConfigDocument::parse(b"{nope", Format::Json).unwrap_err();
        assert_eq!(err.to_string(), "invalid_json:document");

        let err = ConfigDocument::parse(b"endpoints: [unclosed", Format::Yaml).unwrap_err();
        assert_eq!(err.to_string(), "invalid_document:document");
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        assert_eq!(store.load().await.unwrap(), None);

        store.save(&json!({"a": 1})).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(json!({"a": 1})));

        store.set_read_only(true);
        assert!(store.save(&json!({"a": 2})).await.is_err());
        assert_eq!(store.document().await, Some(json!({"a": 1})));
    }
}
