//! Storage Trait Definitions
//!
//! Defines the document-store interface the whitelist layer is written
//! against: named tables of JSON documents keyed by a single partition key.
//! Implementations can use SQLite (production) or in-memory (testing).

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// A stored document (always a JSON object)
pub type Document = serde_json::Value;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableExists(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Provisioning state of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    /// Table was requested but cannot serve reads/writes yet
    Creating,
    /// Table is ready
    Active,
}

/// Document store interface
///
/// Implementations:
/// - `SqliteDocumentStore` - Production storage with SQLite
/// - `MemoryDocumentStore` - In-memory storage for testing and demos
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Provisioning state of a table, `None` if it does not exist
    async fn describe_table(&self, table: &str) -> StorageResult<Option<TableStatus>>;

    /// Create a table keyed by `partition_key`
    ///
    /// Fails with `TableExists` if the table is already there.
    async fn create_table(&self, table: &str, partition_key: &str) -> StorageResult<()>;

    /// Get a document by key
    async fn get_item(&self, table: &str, key: &str) -> StorageResult<Option<Document>>;

    /// Insert or replace a document
    async fn put_item(&self, table: &str, key: &str, document: Document) -> StorageResult<()>;

    /// Insert a document only if the key is free, `Duplicate` otherwise
    async fn insert_item(&self, table: &str, key: &str, document: Document) -> StorageResult<()>;

    /// Delete a document, returning what was stored
    async fn delete_item(&self, table: &str, key: &str) -> StorageResult<Option<Document>>;

    /// All documents in a table, unordered
    async fn scan(&self, table: &str) -> StorageResult<Vec<Document>>;

    /// Insert or replace many documents
    async fn batch_write(&self, table: &str, items: Vec<(String, Document)>) -> StorageResult<()>;
}

/// Check a table name before it is spliced into a statement
pub fn validate_table_name(table: &str) -> StorageResult<()> {
    if table.is_empty() || table.len() > 255 {
        return Err(StorageError::InvalidData(format!(
            "table name must be 1-255 characters: {:?}",
            table
        )));
    }

    if !table
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(StorageError::InvalidData(format!(
            "table name may only contain [A-Za-z0-9_.-]: {:?}",
            table
        )));
    }

    Ok(())
}
