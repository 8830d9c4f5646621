//! Catalog HTTP server
//!
//! Serves the author/book catalog over JSON.

use anyhow::{anyhow, Context};
use catalog_core::config::DEFAULT_STORE;
use catalog_core::{default_log_level, CatalogService, StoreConfig};
use catalog_http::{create_router, AppState};
use clap::Parser;
use log::info;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "catalog-http", version, about = "Author/book catalog HTTP server")]
struct Args {
    /// Store to open: sqlite::memory:, sqlite:<path>, <file>.db or mongodb://...
    #[arg(long, env = "CATALOG_STORE", default_value = DEFAULT_STORE)]
    store: String,

    /// MongoDB database name
    #[arg(long, env = "CATALOG_MONGO_DATABASE")]
    database: Option<String>,

    /// Address to listen on
    #[arg(long, env = "CATALOG_HTTP_ADDR", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    #[arg(long, env = "CATALOG_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write rotating log files here instead of stderr (absolute path)
    #[arg(long, env = "CATALOG_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| default_log_level().to_string());
    match &args.log_dir {
        Some(dir) => catalog_core::init_logging(&level, &dir.to_string_lossy()),
        None => catalog_core::init_stderr_logging(&level),
    }
    .map_err(|err| anyhow!(err))?;

    info!(
        "event=server_start module=http status=start version={}",
        env!("CARGO_PKG_VERSION")
    );

    let mut config = StoreConfig::parse(&args.store)?;
    if let Some(database) = args.database {
        config = config.with_database(database);
    }
    config.ensure_supported()?;

    let store = tokio::task::spawn_blocking(move || config.open())
        .await
        .context("store open task failed")??;
    let state = AppState::new(CatalogService::new(store));
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(
        "event=server_start module=http status=ok addr={}",
        args.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await?;
    info!("event=server_stop module=http status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("event=server_stop module=http status=error error={err}");
    }
}
