//! Hookbin webhook receiver.
//!
//! Main entry point. Loads configuration, opens the configured event store
//! and serves the HTTP API until shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use hookbin_api::{AppState, Config, StorageBackend};
use hookbin_core::{EventStore, FileEventStore, MemoryEventStore, SqliteEventStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log)?;

    info!(
        host = %config.host,
        port = config.port,
        backend = ?config.storage_backend,
        request_timeout_secs = config.request_timeout,
        "Starting hookbin webhook receiver"
    );

    match config.storage_backend {
        StorageBackend::Sqlite => {
            let store = Arc::new(connect_sqlite(&config).await?);
            serve(store.clone(), &config).await?;
            store.close().await;
            info!("Database connections closed");
        },
        StorageBackend::File => {
            let store = FileEventStore::open(&config.data_dir).await.with_context(|| {
                format!("Failed to open event store in {}", config.data_dir.display())
            })?;
            serve(Arc::new(store), &config).await?;
        },
        StorageBackend::Memory => {
            warn!("Using in-memory storage; events are lost on restart");
            serve(Arc::new(MemoryEventStore::new()), &config).await?;
        },
    }

    info!("Hookbin shutdown complete");
    Ok(())
}

async fn serve(store: Arc<dyn EventStore>, config: &Config) -> Result<()> {
    let addr = config.parse_server_addr()?;
    let state = AppState::new(store).with_request_timeout(config.request_timeout());

    hookbin_api::start_server(state, addr).await.context("HTTP server failed")
}

/// Initializes tracing from the configured filter directive.
fn init_tracing(directive: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(directive)
        .with_context(|| format!("Invalid log filter: {directive}"))?;

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}

/// Opens the SQLite store, retrying while the database file is locked or
/// its directory is still being provisioned.
async fn connect_sqlite(config: &Config) -> Result<SqliteEventStore> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    if config.database_url.contains(":memory:") {
        return SqliteEventStore::in_memory().await.context("Failed to open in-memory database");
    }

    let mut retries = 0;
    loop {
        match SqliteEventStore::connect(&config.database_url, config.database_max_connections).await
        {
            Ok(store) => {
                store.health_check().await.context("Failed to verify database connection")?;
                info!(max_connections = config.database_max_connections, "Database ready");
                return Ok(store);
            },
            Err(e) if retries < MAX_RETRIES => {
                retries += 1;
                warn!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to open database after retries");
            },
        }
    }
}
