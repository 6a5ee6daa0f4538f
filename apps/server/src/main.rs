#![warn(clippy::all, clippy::pedantic)]

use std::path::PathBuf;

use clap::Parser;
use logger::{init_tracing_with_level, parse_level};
use tracing::level_filters::LevelFilter;
use vigil_server::config::Config;
use vigil_server::error::AppError;

/// Endpoint health-check server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the server configuration file
    #[arg(short, long, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind the HTTP API to
    #[arg(long, env = "VIGIL_BIND")]
    bind: Option<String>,

    /// Port of the HTTP API
    #[arg(short, long, env = "VIGIL_PORT")]
    port: Option<u16>,

    /// Path of the stored settings and endpoints document
    #[arg(short, long, env = "VIGIL_DATA")]
    data: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_config(cli.config.as_ref())?;
    if let Some(bind) = cli.bind {
        config.http.bind = bind;
    }
    if let Some(port) = cli.port {
        config.http.port = port;
    }
    if let Some(data) = cli.data {
        config.storage.path = data;
    }

    let log = init_tracing_with_level(parse_level(&config.log.level).unwrap_or(LevelFilter::INFO));
    tracing::debug!("{}", config);

    vigil_server::run(config, log).await
}
