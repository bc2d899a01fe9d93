//! Storage Layer Module
//!
//! Document-store persistence for the whitelist.
//!
//! This module contains:
//! - Storage trait definitions for abstraction
//! - SQLite implementation for production
//! - In-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience
pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;
pub use traits::{
    validate_table_name, Document, DocumentStore, StorageError, StorageResult, TableStatus,
};

#[cfg(test)]
pub use traits::MockDocumentStore;
