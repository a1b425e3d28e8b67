//! Launchpad license server
//!
//! Issues license keys and decides which machines may use them.
//!
//! Usage:
//!   launchpad-server --port 8080 --db-backend mysql
//!
//! Every flag can also be set through its environment variable (`PORT`,
//! `DB_HOST`, `DB_BACKEND`, ...). The server refuses to start until the
//! store answers and holds the expected tables.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use launchpad_license::{ActivationService, LicenseStore, MemoryLicenseStore};
use launchpad_server::build_router;
use launchpad_server::config::{Args, Backend};
use launchpad_store::{
    MySqlLicenseStore, SqliteLicenseStore, StorageError, connect_with_retry,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    info!(backend = ?args.db_backend, "Launchpad server starting...");
    match args.db_backend {
        Backend::Mysql => {
            let store = open_mysql(&args).await?;
            serve(&args, store.clone()).await?;
            store.close().await;
            Ok(())
        }
        Backend::Sqlite => serve(&args, open_sqlite(&args).await?).await,
        Backend::Memory => {
            warn!("using in-memory store, licenses will not survive a restart");
            serve(&args, MemoryLicenseStore::new()).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn open_mysql(args: &Args) -> Result<MySqlLicenseStore> {
    let config = args.mysql_config();
    let config = &config;
    let migrate = args.db_migrate;

    connect_with_retry(args.retry_policy(), move || async move {
        let store = MySqlLicenseStore::connect(config).await?;
        if migrate {
            store.migrate().await?;
        }
        store.verify_schema().await?;
        Ok::<_, StorageError>(store)
    })
    .await
    .context("Failed to connect to database")
}

async fn open_sqlite(args: &Args) -> Result<SqliteLicenseStore> {
    let path = &args.db_path;

    connect_with_retry(args.retry_policy(), move || async move {
        let store = SqliteLicenseStore::open(path)?;
        store.verify_schema().await?;
        Ok::<_, StorageError>(store)
    })
    .await
    .with_context(|| format!("Failed to open database at {}", path.display()))
}

async fn serve<S: LicenseStore>(args: &Args, store: S) -> Result<()> {
    let admission = args.admission();
    let service = Arc::new(ActivationService::new(store).with_admission(admission));
    let app = build_router(service);

    let addr = args.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP port {}", args.port))?;
    info!(%addr, ?admission, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Launchpad server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
