use std::sync::Arc;

use anyhow::Context;
use db::{DBService, MemoryRecordStore, RecordStore, SqliteRecordStore};
use server::{
    DEFAULT_LOG_FILTER,
    config::{Config, StoreBackend},
    shutdown_signal,
    state::AppState,
};
use services::services::registry::ResourceRegistry;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env()?;
    let extra_resources = config.read_resources()?;

    let (store, db): (Arc<dyn RecordStore>, Option<DBService>) = match config.store_backend() {
        StoreBackend::Memory => {
            info!("Using in-memory record store");
            (Arc::new(MemoryRecordStore::new()), None)
        }
        StoreBackend::Sqlite(url) => {
            let db = DBService::new(&url)
                .await
                .with_context(|| format!("failed to open database {url}"))?;
            (Arc::new(SqliteRecordStore::new(db.pool.clone())), Some(db))
        }
    };

    let registry =
        ResourceRegistry::with_builtins(store, config.store_timeout, extra_resources.as_deref())?;
    let state = AppState::new(registry, db.clone());

    let listener = TcpListener::bind(config.address())
        .await
        .with_context(|| format!("failed to bind {}", config.address()))?;
    info!(
        address = %listener.local_addr()?,
        resources = state.registry().len(),
        "Server listening"
    );

    server::serve(listener, state, shutdown_signal()).await?;

    if let Some(db) = db {
        db.close().await;
    }
    info!("Server stopped");
    Ok(())
}
