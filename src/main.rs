mod config;
mod coordinator;
mod pages;
mod routes;
mod state;
mod store;

use std::sync::Arc;

use config::{ConfigError, ServerConfig, StoreBackend};
use store::{FileStore, MemoryStore, PolicyStore, StoreError};

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("policy store init failed: {0}")]
    Store(#[from] StoreError),
    #[error("server i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env()?;

    let store: Arc<dyn PolicyStore> = match &config.store {
        StoreBackend::File { path, key } => {
            let file_store = FileStore::new(path.clone(), key.clone());
            tracing::info!(path = %file_store.path().display(), %key, "using file policy store");
            Arc::new(file_store)
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory policy store — settings will not survive restart");
            Arc::new(MemoryStore::new())
        }
    };
    store::seed_defaults(store.as_ref()).await?;

    let state = state::AppState::new(store, config.coordinator_queue_capacity, config.page_queue_capacity);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::info!(port = config.port, "duskmode listening");
    axum::serve(listener, app).await?;
    Ok(())
}
