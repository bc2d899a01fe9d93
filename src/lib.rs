//! Presale Admin Backend
//!
//! Server-side services for the presale admin dashboard.
//!
//! ## Components
//!
//! 1. **Whitelist Store** - wallet address → whitelist entry over a document table,
//!    with lazy table provisioning
//! 2. **Route Layer** - HTTP handlers for the dashboard, degrading to static
//!    fallback data when the store fails
//!
//! ## Storage
//!
//! Whitelist entries live in a [`storage::DocumentStore`]: SQLite for
//! deployments, in-memory for tests and local demos.

pub mod api;
pub mod common;
pub mod storage;
pub mod types;
pub mod whitelist;

// Re-exports: Configuration and errors
pub use common::{ConfigError, Environment, PresaleConfig, PresaleError, Result, StoreBackend};

// Re-exports: Storage
pub use storage::{
    DocumentStore, MemoryDocumentStore, SqliteDocumentStore, StorageError, StorageResult,
};

// Re-exports: Whitelist
pub use types::whitelist::{
    BulkAddOutcome, EntryStatus, NewWhitelistEntry, WhitelistEntry, WhitelistPatch, WhitelistRow,
};
pub use whitelist::{FallbackData, OnStoreError, WhitelistError, WhitelistStore};

// Re-exports: API
pub use api::{create_router, start_server, ApiError, AppState, SharedAppState};
