//! Notification dispatch.
//!
//! The [`Dispatcher`] consumes status events from the scheduler, keeps the
//! ones the configured [`NotifyPolicy`] accepts and hands them to every active
//! [`Notifier`]. Channels are re-read from the current settings for every
//! event, so enabling a webhook takes effect without a restart.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::model::{HealthStatus, StatusEvent};
use crate::settings::{NotifyPolicy, Settings, WebhookSettings};

/// Deadline for a single webhook delivery
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// A message ready to be delivered by any notifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub message: String,
    pub level: Level,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn from_event(event: &StatusEvent) -> Self {
        let (subject, level) = match (event.previous, event.current) {
            (HealthStatus::Error, HealthStatus::Error) => (format!("{} is still failing", event.name), Level::Warning),
            (_, HealthStatus::Error) => (format!("{} is failing", event.name), Level::Error),
            (HealthStatus::Error, HealthStatus::Ok) => (format!("{} recovered", event.name), Level::Info),
            _ => (format!("{} is {}", event.name, event.current), Level::Info),
        };

        let message = match event.reason {
            Some(reason) => format!("{} ({}): {} - {}", event.name, event.url, reason, event.detail),
            None => format!("{} ({}): {}", event.name, event.url, event.detail),
        };

        Self { subject, message, level, endpoint_id: Some(event.id.clone()), timestamp: event.checked_at }
    }

    pub fn test() -> Self {
        Self {
            subject: "Test notification".to_string(),
            message: "Notification channels are configured correctly.".to_string(),
            level: Level::Info,
            endpoint_id: None,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the log. Always active.
pub struct TracingNotifier;

#[async_trait::async_trait]
impl Notifier for TracingNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        match notification.level {
            Level::Error => error!(subject = %notification.subject, "{}", notification.message),
            Level::Warning => warn!(subject = %notification.subject, "{}", notification.message),
            Level::Info => info!(subject = %notification.subject, "{}", notification.message),
        }
        Ok(())
    }
}

/// Sends the notification as JSON to the configured URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    settings: WebhookSettings,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, settings: WebhookSettings) -> Self {
        Self { client, settings }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, notification: &Notification) -> Result<()> {
        let method = reqwest::Method::from_bytes(self.settings.method.as_str().as_bytes())
            .map_err(|e| anyhow!("invalid webhook method: {}", e))?;

        let mut request = self.client.request(method, &self.settings.url).json(notification);
        if let Some(headers) = &self.settings.headers {
            for (name, value) in headers.iter() {
                request = request.header(name, value);
            }
        }

        let response = request.send().await.context("webhook request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("webhook returned HTTP {}", status.as_u16()));
        }
        Ok(())
    }
}

/// Outcome of delivering one notification through one notifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub notifier: String,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct Dispatcher {
    settings: watch::Receiver<Settings>,
    client: reqwest::Client,
    extra: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new(settings: watch::Receiver<Settings>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("failed to build webhook client")?;

        Ok(Self { settings, client, extra: Vec::new() })
    }

    /// Add a notifier that is active regardless of settings
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.extra.push(notifier);
        self
    }

    pub fn policy(&self) -> NotifyPolicy {
        self.settings.borrow().notify_policy()
    }

    /// Notifiers active under the current settings
    pub fn notifiers(&self) -> Vec<Arc<dyn Notifier>> {
        let mut notifiers: Vec<Arc<dyn Notifier>> = vec![Arc::new(TracingNotifier)];

        let webhook = self.settings.borrow().webhook();
        if webhook.enabled && !webhook.url.is_empty() {
            notifiers.push(Arc::new(WebhookNotifier::new(self.client.clone(), webhook)));
        }

        notifiers.extend(self.extra.iter().cloned());
        notifiers
    }

    /// Forward one event if the policy accepts it. Returns the deliveries
    /// made, empty when the event was filtered out.
    pub async fn dispatch(&self, event: &StatusEvent) -> Vec<Delivery> {
        if !self.policy().accepts(event) {
            debug!(id = %event.id, status = %event.current, "event filtered by notification policy");
            return Vec::new();
        }
        self.deliver(&Notification::from_event(event)).await
    }

    /// Send a test notification through every active notifier
    pub async fn send_test(&self) -> Vec<Delivery> {
        self.deliver(&Notification::test()).await
    }

    async fn deliver(&self, notification: &Notification) -> Vec<Delivery> {
        let mut deliveries = Vec::new();

        for notifier in self.notifiers() {
            let result = notifier.notify(notification).await;
            if let Err(e) = &result {
                error!(notifier = notifier.name(), "failed to send notification: {:#}", e);
            }
            deliveries.push(Delivery {
                notifier: notifier.name().to_string(),
                delivered: result.is_ok(),
                error: result.err().map(|e| format!("{e:#}")),
            });
        }

        deliveries
    }

    /// Consume events until every sender is gone
    pub async fn run(self, mut events: mpsc::Receiver<StatusEvent>) {
        while let Some(event) = events.recv().await {
            self.dispatch(&event).await;
        }
        debug!("event channel closed, dispatcher stopped");
    }

    pub fn spawn(self, events: mpsc::Receiver<StatusEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}
