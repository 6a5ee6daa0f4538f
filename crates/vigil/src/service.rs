//! Configuration service: the single write path for endpoints and settings.
//!
//! Every mutation is normalized first, then persisted as the complete
//! would-be document, and only applied to the registry once the write
//! succeeded. Mutations are serialized so the persisted document and the
//! registry never diverge.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use crate::error::{Error, RegistryError, Result, ValidationError, ValidationKind};
use crate::model::{Endpoint, EndpointConfig, ProbeRecord};
use crate::normalize::normalize_endpoint;
use crate::registry::{Registry, Snapshot};
use crate::settings::{Section, Settings};
use crate::store::{ConfigDocument, ConfigStore, Format};
use crate::submission::Submission;

/// Result of a successful import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub endpoints: usize,
}

pub struct ConfigService {
    registry: Arc<Registry>,
    store: Arc<dyn ConfigStore>,
    settings: watch::Sender<Settings>,
    writes: Mutex<()>,
}

impl ConfigService {
    /// Load the stored document into a fresh service. An empty store is
    /// initialized with the default document.
    pub async fn open(registry: Arc<Registry>, store: Arc<dyn ConfigStore>) -> Result<Self> {
        let document = match store.load().await? {
            Some(value) => ConfigDocument::from_value(&value)?,
            None => {
                let document = ConfigDocument::default();
                store.save(&document.to_value()?).await?;
                info!("initialized empty configuration");
                document
            }
        };

        info!(endpoints = document.endpoints.len(), "configuration loaded");
        registry.replace_all(document.endpoints)?;
        let (settings, _) = watch::channel(document.settings);

        Ok(Self { registry, store, settings, writes: Mutex::new(()) })
    }

    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    /// Watch settings changes, e.g. from the notification dispatcher
    pub fn subscribe_settings(&self) -> watch::Receiver<Settings> {
        self.settings.subscribe()
    }

    pub fn list_endpoints(&self) -> Snapshot {
        self.registry.list()
    }

    pub fn get_endpoint(&self, id: &str) -> Result<Endpoint> {
        Ok(self.registry.get(id)?)
    }

    pub fn history(&self, id: &str) -> Result<Vec<ProbeRecord>> {
        Ok(self.registry.history(id)?)
    }

    pub async fn create_endpoint(&self, submission: &Submission) -> Result<Endpoint> {
        let config = normalize_endpoint(submission)?;

        let _guard = self.writes.lock().await;
        if self.registry.contains(&config.id) {
            return Err(RegistryError::DuplicateId(config.id).into());
        }

        let mut endpoints = self.registry.configs();
        endpoints.push(config.clone());
        self.persist(self.settings(), endpoints).await?;

        let endpoint = self.registry.create(config)?;
        info!(id = %endpoint.config.id, "endpoint created");
        Ok(endpoint)
    }

    /// Replace every field of an endpoint except its id. An `id` in the
    /// submission is ignored.
    pub async fn update_endpoint(&self, id: &str, submission: &Submission) -> Result<Endpoint> {
        let mut config = normalize_endpoint(submission)?;
        config.id = id.to_string();

        let _guard = self.writes.lock().await;
        let mut endpoints = self.registry.configs();
        let slot = endpoints
            .iter_mut()
            .find(|existing| existing.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        *slot = config.clone();
        self.persist(self.settings(), endpoints).await?;

        let endpoint = self.registry.update(id, config)?;
        info!(id = %id, "endpoint updated");
        Ok(endpoint)
    }

    pub async fn delete_endpoint(&self, id: &str) -> Result<()> {
        let _guard = self.writes.lock().await;
        let mut endpoints = self.registry.configs();
        let before = endpoints.len();
        endpoints.retain(|existing| existing.id != id);
        if endpoints.len() == before {
            return Err(RegistryError::NotFound(id.to_string()).into());
        }
        self.persist(self.settings(), endpoints).await?;

        self.registry.delete(id)?;
        info!(id = %id, "endpoint deleted");
        Ok(())
    }

    /// Merge `data` into one settings section. `section` is a dotted section
    /// path or a form id such as `smtpSettingsForm`.
    pub async fn save_section(&self, section: &str, data: &Submission) -> Result<Settings> {
        let section = parse_section(section)?;

        let _guard = self.writes.lock().await;
        let settings = self.settings().with_section(section, data)?;
        self.persist(settings.clone(), self.registry.configs()).await?;

        self.settings.send_replace(settings.clone());
        info!(section = section.as_str(), "settings saved");
        Ok(settings)
    }

    /// One settings section, addressed like [`ConfigService::save_section`]
    pub fn settings_section(&self, section: &str) -> Result<Map<String, Value>> {
        let section = parse_section(section)?;
        Ok(self.settings().section(section).cloned().unwrap_or_default())
    }

    /// Restore the default settings. Endpoints are kept.
    pub async fn reset_settings(&self) -> Result<Settings> {
        let _guard = self.writes.lock().await;
        let settings = Settings::default();
        self.persist(settings.clone(), self.registry.configs()).await?;

        self.settings.send_replace(settings.clone());
        info!("settings reset to defaults");
        Ok(settings)
    }

    /// Replace the whole configuration with an uploaded document. Either
    /// every entry is applied or nothing is.
    pub async fn import(&self, body: &[u8], format: Format) -> Result<ImportSummary> {
        let document = ConfigDocument::parse(body, format)?;
        let count = document.endpoints.len();

        let _guard = self.writes.lock().await;
        self.persist(document.settings.clone(), document.endpoints.clone()).await?;

        self.registry.replace_all(document.endpoints)?;
        self.settings.send_replace(document.settings);
        info!(endpoints = count, "configuration imported");
        Ok(ImportSummary { endpoints: count })
    }

    /// The current configuration as a canonical document
    pub fn export(&self, format: Format) -> Result<String> {
        let document = ConfigDocument { settings: self.settings(), endpoints: self.registry.configs() };
        Ok(document.render(format)?)
    }

    async fn persist(&self, settings: Settings, endpoints: Vec<EndpointConfig>) -> Result<()> {
        let document = ConfigDocument { settings, endpoints }.to_value()?;
        self.store.save(&document).await.map_err(|e| {
            error!("failed to persist configuration: {}", e);
            Error::from(e)
        })
    }
}

fn parse_section(name: &str) -> Result<Section, ValidationError> {
    Section::parse(name).ok_or_else(|| {
        ValidationError::new("section", ValidationKind::InvalidValue, format!("Unknown settings section '{name}'"))
    })
}
