#![warn(clippy::all, clippy::pedantic)]

use std::sync::Arc;
use std::time::Duration;

use actix_web::web::{self, ServiceConfig};
use actix_web::{App, HttpServer};
use logger::LogHandle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, level_filters::LevelFilter};
use vigil::{ConfigService, Dispatcher, HttpTransport, JsonFileStore, Registry, Scheduler, Settings};

pub mod config;
pub mod error;
pub mod routes;

use config::Config;
use error::AppError;

/// Largest accepted request body, imports included
const MAX_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Shared by every request handler
pub struct AppState {
    pub service: Arc<ConfigService>,
    pub dispatcher: Dispatcher,
}

/// Register state and routes on an actix app
pub fn configure(cfg: &mut ServiceConfig, state: web::Data<AppState>) {
    cfg.app_data(state)
        .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
        .configure(routes::routes);
}

pub fn build_registry(scheduler: &config::Scheduler) -> Registry {
    Registry::with_history_limit(scheduler.max_history_records)
}

/// Apply the `general.logging_level` setting now and whenever it changes
pub fn follow_logging_level(
    mut settings: watch::Receiver<Settings>,
    apply: impl Fn(LevelFilter) + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut applied = None;
        loop {
            let level = settings.borrow_and_update().logging_level();
            if let Some(level) = level.filter(|level| applied != Some(*level)) {
                apply(level);
                info!("log level set to {}", level);
                applied = Some(level);
            }
            if settings.changed().await.is_err() {
                break;
            }
        }
    })
}

/// Load the stored configuration, start probing and serve the API until the
/// server stops. With a `log` handle, the stored logging level takes over
/// from the startup level once the configuration is loaded.
pub async fn run(config: Config, log: Option<LogHandle>) -> Result<(), AppError> {
    let registry = Arc::new(build_registry(&config.scheduler));
    let store = Arc::new(JsonFileStore::new(config.storage.path.clone()));
    let service = Arc::new(ConfigService::open(registry.clone(), store).await?);

    if let Some(log) = log {
        follow_logging_level(service.subscribe_settings(), move |level| {
            log.set_level(level);
        });
    }

    let (events_tx, events_rx) = mpsc::channel(config.scheduler.event_buffer.max(1));
    let dispatcher = Dispatcher::new(service.subscribe_settings())?;
    dispatcher.clone().spawn(events_rx);

    let transport = HttpTransport::new(&config.transport.user_agent)?;
    let scheduler = Scheduler::new(registry, Arc::new(transport), events_tx)
        .with_reconcile_interval(Duration::from_secs(config.scheduler.reconcile_seconds))
        .spawn();

    let state = web::Data::new(AppState { service, dispatcher });
    info!("listening on {}:{}", config.http.bind, config.http.port);

    let served = HttpServer::new(move || {
        let state = state.clone();
        App::new().configure(move |cfg| configure(cfg, state))
    })
    .bind((config.http.bind.as_str(), config.http.port))?
    .run()
    .await;

    scheduler.shutdown().await;
    info!("scheduler stopped");

    Ok(served?)
}
