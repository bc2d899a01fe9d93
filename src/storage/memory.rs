//! In-Memory Storage Implementation
//!
//! Provides an in-memory document store for testing and development.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{
    validate_table_name, Document, DocumentStore, StorageError, StorageResult, TableStatus,
};

/// One in-memory table
#[derive(Debug, Default)]
struct MemoryTable {
    partition_key: String,
    /// Remaining `describe_table` calls that report `Creating`
    pending_polls: u32,
    items: HashMap<String, Document>,
}

/// In-memory document store
///
/// Thread-safe storage for document tables.
/// Uses Arc<RwLock<>> for concurrent access.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
    /// Number of polls a freshly created table stays in `Creating`
    provisioning_polls: u32,
    available: Arc<AtomicBool>,
}

impl MemoryDocumentStore {
    /// Create a new empty store whose tables are active immediately
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            provisioning_polls: 0,
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Newly created tables report `Creating` for the given number of polls
    pub fn with_provisioning_delay(mut self, polls: u32) -> Self {
        self.provisioning_polls = polls;
        self
    }

    /// Simulate an outage: every call fails with `Connection` while unavailable
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Partition key a table was created with
    pub async fn partition_key(&self, table: &str) -> Option<String> {
        let tables = self.tables.read().await;
        tables.get(table).map(|t| t.partition_key.clone())
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Connection(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up an active table or fail with `TableNotFound`
fn active_table<'a>(
    tables: &'a HashMap<String, MemoryTable>,
    table: &str,
) -> StorageResult<&'a MemoryTable> {
    match tables.get(table) {
        Some(t) if t.pending_polls == 0 => Ok(t),
        _ => Err(StorageError::TableNotFound(table.to_string())),
    }
}

fn active_table_mut<'a>(
    tables: &'a mut HashMap<String, MemoryTable>,
    table: &str,
) -> StorageResult<&'a mut MemoryTable> {
    match tables.get_mut(table) {
        Some(t) if t.pending_polls == 0 => Ok(t),
        _ => Err(StorageError::TableNotFound(table.to_string())),
    }
}

fn ensure_object(key: &str, document: &Document) -> StorageResult<()> {
    if document.is_object() {
        Ok(())
    } else {
        Err(StorageError::InvalidData(format!(
            "document for {} is not a JSON object",
            key
        )))
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn describe_table(&self, table: &str) -> StorageResult<Option<TableStatus>> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        Ok(tables.get_mut(table).map(|t| {
            if t.pending_polls > 0 {
                t.pending_polls -= 1;
                TableStatus::Creating
            } else {
                TableStatus::Active
            }
        }))
    }

    async fn create_table(&self, table: &str, partition_key: &str) -> StorageResult<()> {
        self.check_available()?;
        validate_table_name(table)?;
        let mut tables = self.tables.write().await;

        if tables.contains_key(table) {
            return Err(StorageError::TableExists(table.to_string()));
        }

        tables.insert(
            table.to_string(),
            MemoryTable {
                partition_key: partition_key.to_string(),
                pending_polls: self.provisioning_polls,
                items: HashMap::new(),
            },
        );

        Ok(())
    }

    async fn get_item(&self, table: &str, key: &str) -> StorageResult<Option<Document>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(active_table(&tables, table)?.items.get(key).cloned())
    }

    async fn put_item(&self, table: &str, key: &str, document: Document) -> StorageResult<()> {
        self.check_available()?;
        ensure_object(key, &document)?;
        let mut tables = self.tables.write().await;

        active_table_mut(&mut tables, table)?
            .items
            .insert(key.to_string(), document);
        Ok(())
    }

    async fn insert_item(&self, table: &str, key: &str, document: Document) -> StorageResult<()> {
        self.check_available()?;
        ensure_object(key, &document)?;
        let mut tables = self.tables.write().await;
        let items = &mut active_table_mut(&mut tables, table)?.items;

        // Check and insert under the same write lock
        if items.contains_key(key) {
            return Err(StorageError::Duplicate(key.to_string()));
        }

        items.insert(key.to_string(), document);
        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &str) -> StorageResult<Option<Document>> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        Ok(active_table_mut(&mut tables, table)?.items.remove(key))
    }

    async fn scan(&self, table: &str) -> StorageResult<Vec<Document>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(active_table(&tables, table)?.items.values().cloned().collect())
    }

    async fn batch_write(&self, table: &str, items: Vec<(String, Document)>) -> StorageResult<()> {
        self.check_available()?;
        for (key, document) in &items {
            ensure_object(key, document)?;
        }

        let mut tables = self.tables.write().await;
        let stored = &mut active_table_mut(&mut tables, table)?.items;
        stored.extend(items);

        Ok(())
    }
}
