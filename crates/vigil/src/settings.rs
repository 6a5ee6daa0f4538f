//! Application settings: `general`, `notifications` (with its `email`,
//! `webhook` and `telegram` channels) and a free-form `advanced` section.
//!
//! Settings are kept as a JSON tree so unknown keys inside a section survive a
//! round trip. Known keys are normalized on every save.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::level_filters::LevelFilter;

use crate::error::{ValidationError, ValidationKind};
use crate::model::{Headers, HealthStatus, Method, StatusEvent};
use crate::normalize::{
    bool_field, headers_field, integer_field, normalize_list, scalar_text, validate_url,
};
use crate::submission::Submission;

/// A settings section, addressable by its dotted path or by the id of the
/// form that edits it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    General,
    Notifications,
    Email,
    Webhook,
    Telegram,
    Advanced,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::General,
        Section::Notifications,
        Section::Email,
        Section::Webhook,
        Section::Telegram,
        Section::Advanced,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        let section = match name.trim() {
            "general" | "generalSettingsForm" => Section::General,
            "notifications" | "notificationSettingsForm" => Section::Notifications,
            "notifications.email" | "email" | "smtpSettingsForm" => Section::Email,
            "notifications.webhook" | "webhook" | "webhookSettingsForm" => Section::Webhook,
            "notifications.telegram" | "telegram" | "telegramSettingsForm" => Section::Telegram,
            "advanced" | "advancedSettingsForm" => Section::Advanced,
            _ => return None,
        };
        Some(section)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::General => "general",
            Section::Notifications => "notifications",
            Section::Email => "notifications.email",
            Section::Webhook => "notifications.webhook",
            Section::Telegram => "notifications.telegram",
            Section::Advanced => "advanced",
        }
    }

    fn path(&self) -> &'static [&'static str] {
        match self {
            Section::General => &["general"],
            Section::Notifications => &["notifications"],
            Section::Email => &["notifications", "email"],
            Section::Webhook => &["notifications", "webhook"],
            Section::Telegram => &["notifications", "telegram"],
            Section::Advanced => &["advanced"],
        }
    }

    /// Keys owned by nested sections, which the parent form cannot overwrite
    fn nested_keys(&self) -> &'static [&'static str] {
        match self {
            Section::Notifications => &["email", "webhook", "telegram"],
            _ => &[],
        }
    }
}

/// Which status events reach the notifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifyPolicy {
    /// Entering `error`, and recovering from it
    #[default]
    Transition,
    /// Every failed probe, plus recoveries
    Always,
}

impl NotifyPolicy {
    /// `error` is accepted as an older spelling of `transition`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "transition" | "error" => Some(NotifyPolicy::Transition),
            "always" => Some(NotifyPolicy::Always),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyPolicy::Transition => "transition",
            NotifyPolicy::Always => "always",
        }
    }

    pub fn accepts(&self, event: &StatusEvent) -> bool {
        match self {
            NotifyPolicy::Transition => event.is_transition(),
            NotifyPolicy::Always => event.current == HealthStatus::Error || event.is_transition(),
        }
    }
}

/// Webhook channel, as read from `notifications.webhook`
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookSettings {
    pub enabled: bool,
    pub url: String,
    pub method: Method,
    pub headers: Option<Headers>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Default for Settings {
    fn default() -> Self {
        let tree = json!({
            "general": {
                "app_name": "Vigil",
                "logging_level": "info",
            },
            "notifications": {
                "notify_on_status": "transition",
                "email": {
                    "enabled": false,
                    "smtp_server": "",
                    "smtp_port": 587,
                    "username": "",
                    "password": "",
                    "sender": "",
                    "recipients": [],
                    "use_tls": true,
                },
                "webhook": {
                    "enabled": false,
                    "url": "",
                    "method": "POST",
                    "headers": {"Content-Type": "application/json"},
                },
                "telegram": {
                    "enabled": false,
                    "token": "",
                    "chat_ids": [],
                },
            },
            "advanced": {},
        });

        match tree {
            Value::Object(map) => Settings(map),
            _ => Settings(Map::new()),
        }
    }
}

impl Settings {
    /// Rebuild settings from a stored tree. Each known section present in the
    /// tree is normalized over the defaults; anything else is dropped.
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let Value::Object(tree) = value else {
            return Err(ValidationError::new(
                "settings",
                ValidationKind::InvalidDocument,
                "Settings must be an object",
            ));
        };

        let mut settings = Settings::default();
        for section in Section::ALL {
            if let Some(Value::Object(data)) = lookup(tree, section.path()) {
                settings = settings.with_section(section, &Submission::from_map(data.clone()))?;
            }
        }
        Ok(settings)
    }

    pub fn section(&self, section: Section) -> Option<&Map<String, Value>> {
        lookup(&self.0, section.path()).and_then(Value::as_object)
    }

    /// Return a copy with `data` merged into `section`. Submitted keys replace
    /// existing ones; keys not submitted are kept.
    pub fn with_section(&self, section: Section, data: &Submission) -> Result<Self, ValidationError> {
        let mut merged = self.section(section).cloned().unwrap_or_default();

        for (key, value) in data.clone().into_map() {
            if value.is_null() || section.nested_keys().contains(&key.as_str()) {
                continue;
            }
            let field = format!("{}.{}", section.as_str(), key);
            match normalize_value(section, &key, &field, data)? {
                Some(normalized) => merged.insert(key, normalized),
                None => merged.remove(&key),
            };
        }

        let mut tree = self.0.clone();
        insert(&mut tree, section.path(), merged);
        Ok(Settings(tree))
    }

    pub fn notify_policy(&self) -> NotifyPolicy {
        self.section(Section::Notifications)
            .and_then(|section| section.get("notify_on_status"))
            .and_then(Value::as_str)
            .and_then(NotifyPolicy::parse)
            .unwrap_or_default()
    }

    pub fn webhook(&self) -> WebhookSettings {
        let section = Submission::from_map(self.section(Section::Webhook).cloned().unwrap_or_default());
        let text = |key: &str| section.get(key).and_then(Value::as_str).unwrap_or_default().trim().to_string();

        WebhookSettings {
            enabled: bool_field(&section, "enabled", false),
            url: text("url"),
            method: Method::parse(&text("method")).unwrap_or(Method::Post),
            headers: headers_field(section.get("headers")).ok().flatten(),
        }
    }

    /// Default log level chosen in the general section
    pub fn logging_level(&self) -> Option<LevelFilter> {
        self.section(Section::General)?.get("logging_level")?.as_str()?.parse().ok()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Normalize one submitted key of a section. `None` removes the key.
fn normalize_value(
    section: Section,
    key: &str,
    field: &str,
    data: &Submission,
) -> Result<Option<Value>, ValidationError> {
    let value = data.get(key);

    let normalized = match (section, key) {
        (_, "enabled") | (Section::Email, "use_tls") => Value::Bool(bool_field(data, key, false)),
        (Section::Email, "recipients") | (Section::Telegram, "chat_ids") => {
            let list = normalize_list(field, value).map_err(|e| retag(e, field))?;
            Value::Array(list.into_iter().map(Value::String).collect())
        }
        (Section::Email, "smtp_port") => {
            let port = integer_field(data, key, 587, 1..=65535).map_err(|e| retag(e, field))?;
            Value::from(port)
        }
        (Section::Webhook, "url") => {
            let url = scalar_text(field, value)?.unwrap_or_default();
            if !url.is_empty() {
                validate_url(field, &url)?;
            }
            Value::String(url)
        }
        (Section::Webhook, "method") => {
            let token = scalar_text(field, value)?.unwrap_or_else(|| Method::Post.to_string());
            let method = Method::parse(&token).ok_or_else(|| {
                ValidationError::new(field, ValidationKind::InvalidMethod, format!("Invalid HTTP method '{token}'"))
            })?;
            Value::String(method.to_string())
        }
        (Section::Webhook, "headers") => match headers_field(value).map_err(|e| retag(e, field))? {
            Some(headers) => serde_json::to_value(&headers)
                .map_err(|e| ValidationError::new(field, ValidationKind::InvalidValue, e.to_string()))?,
            None => return Ok(None),
        },
        (Section::General, "logging_level") => {
            let level = scalar_text(field, value)?.unwrap_or_else(|| "info".to_string()).to_ascii_lowercase();
            if level.parse::<LevelFilter>().is_err() {
                return Err(ValidationError::new(
                    field,
                    ValidationKind::InvalidValue,
                    "logging_level must be trace, debug, info, warn, error or off",
                ));
            }
            Value::String(level)
        }
        (Section::Notifications, "notify_on_status") => {
            let text = scalar_text(field, value)?.unwrap_or_default();
            let policy = NotifyPolicy::parse(&text).ok_or_else(|| {
                ValidationError::new(
                    field,
                    ValidationKind::InvalidValue,
                    "notify_on_status must be 'transition' or 'always'",
                )
            })?;
            Value::String(policy.as_str().to_string())
        }
        _ => match value {
            Some(value) => value.clone(),
            None => return Ok(None),
        },
    };

    Ok(Some(normalized))
}

fn retag(mut error: ValidationError, field: &str) -> ValidationError {
    error.field = field.to_string();
    error
}

fn lookup<'a>(tree: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(tree.get(*first)?, |node, key| node.as_object()?.get(*key))
}

fn insert(tree: &mut Map<String, Value>, path: &[&str], section: Map<String, Value>) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut node = tree;
    for key in parents {
        let entry = node.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(child) = entry else {
            return;
        };
        node = child;
    }
    node.insert(last.to_string(), Value::Object(section));
}
