use std::sync::Arc;

use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    cli::ServeArgs,
    client::{ClientConfig, GithubApi},
    config::{RelayConfig, default_config_path, load_config},
    logging::{LoggingConfig, init_logging},
    result::Result,
    server::RelayServer,
    store::Database,
};

pub struct ServerComponents {
    pub server: RelayServer,
    pub config: RelayConfig,
    pub _log_guard: Option<WorkerGuard>,
}

/// Load configuration, start logging and bind the relay server
pub async fn initialize_server(args: ServeArgs) -> Result<ServerComponents> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let config = resolve_config(load_config(&config_path)?, &args);
    config.validate()?;

    let log_guard = initialize_logging(&config, args.log_level.as_deref())?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "ghrelay server starting up"
    );

    if config.github_token.is_none() {
        warn!("No GitHub token configured; anonymous requests are limited to 60 per hour");
    }

    let api = Arc::new(GithubApi::new(ClientConfig::from(&config))?);
    let database = Database::new(config.database_path.clone());
    let server = RelayServer::bind(config.listen_addr.as_str(), database, api).await?;

    Ok(ServerComponents { server, config, _log_guard: log_guard })
}

/// Layer environment variables and command-line flags over the file values
fn resolve_config(file: RelayConfig, args: &ServeArgs) -> RelayConfig {
    let mut config = file.with_env();

    if let Some(listen) = &args.listen {
        config.listen_addr = listen.as_str().into();
    }
    if let Some(database) = &args.database {
        config.database_path = database.clone();
    }
    config
}

fn initialize_logging(config: &RelayConfig, cli_level: Option<&str>) -> Result<Option<WorkerGuard>> {
    let logging_config = LoggingConfig {
        log_dir: config.log_dir.clone(),
        json: config.log_json,
        ..LoggingConfig::default()
    }
    .with_level(config.log_level.as_deref())
    .with_level(cli_level);

    init_logging(logging_config)
}
