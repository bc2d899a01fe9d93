//! API Server Module
//!
//! Provides the Axum application builder and server startup logic.
//! Consolidates application state and router configuration.

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::middleware::{request_logging_middleware, security_headers_middleware, ApiError};
use super::routes::{health, whitelist};
use crate::common::config::{PresaleConfig, StoreBackend};
use crate::common::logging::log_fallback_event;
use crate::storage::{
    DocumentStore, MemoryDocumentStore, SqliteDocumentStore, StorageError, StorageResult,
};
use crate::whitelist::{FallbackData, FallbackList, OnStoreError, ProvisionConfig, WhitelistStore};

/// Combined application state for all API endpoints
pub struct AppState {
    /// Whitelist persistence
    pub whitelist: WhitelistStore,
    /// Stand-in data for store outages
    pub fallback: FallbackData,
    /// What handlers do when the store fails
    pub on_store_error: OnStoreError,
}

/// Shared application state type
pub type SharedAppState = Arc<AppState>;

impl AppState {
    /// Create new application state over a whitelist store
    pub fn new(whitelist: WhitelistStore, on_store_error: OnStoreError) -> SharedAppState {
        Self::with_fallback(whitelist, FallbackData::default(), on_store_error)
    }

    pub fn with_fallback(
        whitelist: WhitelistStore,
        fallback: FallbackData,
        on_store_error: OnStoreError,
    ) -> SharedAppState {
        Arc::new(Self {
            whitelist,
            fallback,
            on_store_error,
        })
    }

    /// Build state from configuration, opening the configured store
    pub fn from_config(config: &PresaleConfig) -> StorageResult<SharedAppState> {
        let store = open_document_store(&config.store)?;
        let whitelist = WhitelistStore::new(store, config.whitelist_table.clone())
            .with_provisioning(ProvisionConfig {
                poll_interval: config.table_poll_interval,
                max_polls: config.table_poll_attempts,
            });

        Ok(Self::new(whitelist, config.on_store_error))
    }

    /// Apply the store-error policy
    ///
    /// Under `ReturnFallback` the error is logged and a fresh fallback list is
    /// handed back for the handler to answer from; under `Propagate` it
    /// becomes a 500.
    pub fn degrade(&self, operation: &str, err: &StorageError) -> Result<FallbackList, ApiError> {
        match self.on_store_error {
            OnStoreError::ReturnFallback => {
                log_fallback_event(operation, "STORAGE_ERROR", &err.to_string());
                Ok(self.fallback.session())
            }
            OnStoreError::Propagate => Err(ApiError::Storage(err.to_string())),
        }
    }
}

/// Open the document store selected by configuration
pub fn open_document_store(backend: &StoreBackend) -> StorageResult<Arc<dyn DocumentStore>> {
    match backend {
        StoreBackend::Sqlite(path) => Ok(Arc::new(SqliteDocumentStore::new(path)?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
    }
}

/// Create the API router with all endpoints
pub fn create_router(state: SharedAppState) -> Router {
    // CORS configuration - allow dashboard origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health::handle_health))
        .route("/whitelist", get(whitelist::handle_list))
        .route("/whitelist/add", post(whitelist::handle_add))
        .route("/whitelist/bulk-add", post(whitelist::handle_bulk_add))
        .route("/whitelist/remove", delete(whitelist::handle_remove))
        .route("/whitelist/update", put(whitelist::handle_update))
        .route("/whitelist/:address", get(whitelist::handle_get))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(cors)
        .with_state(state)
}

/// Start the API server
pub async fn start_server(state: SharedAppState, port: u16) -> Result<(), std::io::Error> {
    let table = state.whitelist.table().to_string();
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, %table, "Presale admin API listening");
    info!("  GET    /whitelist            - List whitelisted wallets");
    info!("  GET    /whitelist/:address   - Look up one wallet");
    info!("  POST   /whitelist/add        - Whitelist a wallet");
    info!("  POST   /whitelist/bulk-add   - Whitelist many wallets");
    info!("  PUT    /whitelist/update     - Change email, allocation or status");
    info!("  DELETE /whitelist/remove     - Remove a wallet");
    info!("  GET    /api/health           - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn memory_state(policy: OnStoreError) -> (MemoryDocumentStore, SharedAppState) {
        let store = MemoryDocumentStore::new();
        let whitelist = WhitelistStore::new(Arc::new(store.clone()), "presale-whitelist");
        (store, AppState::new(whitelist, policy))
    }

    #[test]
    fn test_degrade_returns_fresh_fallback() {
        let (_, state) = memory_state(OnStoreError::ReturnFallback);
        let err = StorageError::Connection("refused".to_string());

        let list = state.degrade("list", &err).unwrap();
        assert_eq!(list.into_entries().len(), 4);
    }

    #[test]
    fn test_degrade_propagates() {
        let (_, state) = memory_state(OnStoreError::Propagate);
        let err = StorageError::Connection("refused".to_string());

        let result = state.degrade("list", &err);
        assert!(matches!(result, Err(ApiError::Storage(msg)) if msg.contains("refused")));
    }

    #[test]
    fn test_open_sqlite_store_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("nested").join("presale.db");

        open_document_store(&StoreBackend::Sqlite(path.clone())).unwrap();
        assert!(path.parent().unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_from_config_memory_backend() {
        let config = PresaleConfig {
            store: StoreBackend::Memory,
            ..PresaleConfig::default()
        };

        let state = AppState::from_config(&config).unwrap();
        assert_eq!(state.whitelist.table(), "presale-whitelist");
        assert_eq!(state.on_store_error, OnStoreError::ReturnFallback);
        state.whitelist.ensure_table().await.unwrap();
    }
}
