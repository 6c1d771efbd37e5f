//! `hypervisord`: the hypervisor admin server.
//!
//! Usage:
//!   hypervisord -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/hypervisor/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use hypervisor::HypervisorModule;
use hypervisor::service::AdminConfig;
use hypervisor_core::{Module, ServiceConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::ServerConfig;

/// Hypervisor admin server.
#[derive(Parser, Debug)]
#[command(name = "hypervisord", about = "Hypervisor admin server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address.
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    let server_config = ServerConfig::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&server_config.log.filter)),
        )
        .init();
    info!("Loaded configuration from {}", config_path.display());

    config::verify_config(&server_config)?;

    let data_dir = PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = ServiceConfig {
        data_dir: Some(data_dir),
        sqlite_path: server_config.storage.sqlite_path.as_ref().map(PathBuf::from),
        listen: cli.listen.clone(),
    };

    let sqlite_path = core_config.resolve_sqlite_path();
    let sql: Arc<dyn hypervisor_sql::SQLStore> = Arc::new(
        hypervisor_sql::SqliteStore::open(&sqlite_path)
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    info!("SQLite store at {}", sqlite_path.display());

    let module = HypervisorModule::new(
        sql,
        AdminConfig {
            max_closure_passes: server_config.resolver.max_closure_passes,
        },
    )?;
    info!("{} module initialized", module.name());

    let app = Router::new()
        .route("/health", get(health))
        .merge(module.routes());

    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("Hypervisor server listening on {}", core_config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}
