use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, Registry, filter::EnvFilter, layer::SubscriberExt, reload, util::SubscriberInitExt};

/// Changes the default level of the installed subscriber at runtime
#[derive(Clone)]
pub struct LogHandle(reload::Handle<EnvFilter, Registry>);

impl LogHandle {
    /// Swap the default directive. `RUST_LOG` still takes precedence.
    pub fn set_level(&self, level: LevelFilter) -> bool {
        match self.0.reload(env_filter(level)) {
            Ok(()) => true,
            Err(e) => {
                warn!("failed to change log level: {}", e);
                false
            }
        }
    }
}

fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder().with_default_directive(level.into()).from_env_lossy()
}

/// Initialize logging at `info`, overridable through `RUST_LOG`
pub fn init_tracing() {
    init_tracing_with_level(LevelFilter::INFO);
}

/// Initialize logging with `level` as the default directive.
///
/// `RUST_LOG` still takes precedence. `RUST_LOG_FORMAT=json` switches to JSON
/// lines. Only the first call installs a subscriber and returns a handle.
pub fn init_tracing_with_level(level: LevelFilter) -> Option<LogHandle> {
    let (filter, handle) = reload::Layer::new(env_filter(level));

    let log_format = var("RUST_LOG_FORMAT").unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().with_filter(filter).boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_filter(filter)
            .boxed(),
    };

    match tracing_subscriber::registry().with(log_layer).try_init() {
        Ok(()) => Some(LogHandle(handle)),
        Err(_) => {
            warn!("tracing subscriber already initialized");
            None
        }
    }
}

/// Map a `logging_level` setting (`debug`, `info`, ...) to a filter
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    level.trim().parse().ok()
}
