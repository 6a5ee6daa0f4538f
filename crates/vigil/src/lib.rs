//! Vigil: endpoint health-check configuration, registry and scheduling.
//!
//! Caller input enters as a [`Submission`], is validated by
//! [`normalize::normalize_endpoint`] and stored through the [`ConfigService`]
//! into the [`Registry`]. The [`Scheduler`] probes every enabled endpoint on
//! its own interval and reports [`StatusEvent`]s to the notification
//! [`Dispatcher`].

pub mod assertions;
pub mod error;
pub mod json_path;
pub mod model;
pub mod normalize;
pub mod notify;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod store;
pub mod submission;

pub use error::{Error, RegistryError, Result, StoreError, ValidationError, ValidationKind};
pub use model::{
    Endpoint, EndpointConfig, FailureReason, Headers, Health, HealthStatus, JsonCheck, Method,
    ProbeOutcome, ProbeRecord, RequestBody, StatusEvent,
};
pub use notify::{Dispatcher, Notification, Notifier};
pub use probe::{HttpTransport, ProbeRequest, ProbeResponse, Transport};
pub use registry::{Registry, Snapshot};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use service::ConfigService;
pub use settings::{NotifyPolicy, Section, Settings};
pub use store::{ConfigDocument, ConfigStore, Format, JsonFileStore, MemoryStore};
pub use submission::Submission;
