//! SQLite Persistent Storage
//!
//! Durable document tables that survive service restarts. Every logical
//! table becomes one SQLite table `(pk TEXT PRIMARY KEY, doc TEXT)`, and a
//! registry table records which tables exist and their partition key.
//! Uses connection pooling via r2d2 for concurrent access.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

use super::traits::{
    validate_table_name, Document, DocumentStore, StorageError, StorageResult, TableStatus,
};

/// SQLite-backed document store with connection pooling
pub struct SqliteDocumentStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteDocumentStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StorageError::Connection(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS document_tables (
                name TEXT PRIMARY KEY,
                partition_key TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    /// Map a rusqlite error for an operation on `table`/`key`
    fn map_err(table: &str, key: &str, e: rusqlite::Error) -> StorageError {
        if let rusqlite::Error::SqliteFailure(ref err, ref msg) = e {
            if err.extended_code == 1555 || err.extended_code == 2067 {
                return StorageError::Duplicate(key.to_string());
            }
            if msg.as_deref().is_some_and(|m| m.contains("no such table")) {
                return StorageError::TableNotFound(table.to_string());
            }
        }
        StorageError::Database(e.to_string())
    }

    fn quoted(table: &str) -> StorageResult<String> {
        validate_table_name(table)?;
        Ok(format!("\"{}\"", table))
    }

    fn encode(key: &str, document: &Document) -> StorageResult<String> {
        if !document.is_object() {
            return Err(StorageError::InvalidData(format!(
                "document for {} is not a JSON object",
                key
            )));
        }
        serde_json::to_string(document).map_err(|e| StorageError::InvalidData(e.to_string()))
    }

    fn decode(raw: &str) -> StorageResult<Document> {
        serde_json::from_str(raw).map_err(|e| StorageError::InvalidData(e.to_string()))
    }

    // Synchronous helper methods for the trait implementations

    fn describe_table_sync(&self, table: &str) -> StorageResult<Option<TableStatus>> {
        let conn = self.conn()?;

        let found = conn
            .query_row(
                "SELECT name FROM document_tables WHERE name = ?1",
                params![table],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        // SQLite DDL is synchronous, so a registered table is always usable
        Ok(found.map(|_| TableStatus::Active))
    }

    fn create_table_sync(&self, table: &str, partition_key: &str) -> StorageResult<()> {
        let quoted = Self::quoted(table)?;
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        tx.execute(
            "INSERT INTO document_tables (name, partition_key, created_at) VALUES (?1, ?2, ?3)",
            params![table, partition_key, chrono::Utc::now().timestamp()],
        )
        .map_err(|e| match Self::map_err(table, table, e) {
            StorageError::Duplicate(_) => StorageError::TableExists(table.to_string()),
            other => other,
        })?;

        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (pk TEXT PRIMARY KEY, doc TEXT NOT NULL);",
            quoted
        ))
        .map_err(|e| StorageError::Database(e.to_string()))?;

        tx.commit()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_item_sync(&self, table: &str, key: &str) -> StorageResult<Option<Document>> {
        let quoted = Self::quoted(table)?;
        let conn = self.conn()?;

        let raw = conn
            .query_row(
                &format!("SELECT doc FROM {} WHERE pk = ?1", quoted),
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| Self::map_err(table, key, e))?;

        raw.as_deref().map(Self::decode).transpose()
    }

    fn put_item_sync(&self, table: &str, key: &str, document: &Document) -> StorageResult<()> {
        let quoted = Self::quoted(table)?;
        let doc = Self::encode(key, document)?;
        let conn = self.conn()?;

        conn.execute(
            &format!("INSERT OR REPLACE INTO {} (pk, doc) VALUES (?1, ?2)", quoted),
            params![key, doc],
        )
        .map_err(|e| Self::map_err(table, key, e))?;

        Ok(())
    }

    fn insert_item_sync(&self, table: &str, key: &str, document: &Document) -> StorageResult<()> {
        let quoted = Self::quoted(table)?;
        let doc = Self::encode(key, document)?;
        let conn = self.conn()?;

        // The primary key makes this atomic: a second insert hits the constraint
        conn.execute(
            &format!("INSERT INTO {} (pk, doc) VALUES (?1, ?2)", quoted),
            params![key, doc],
        )
        .map_err(|e| Self::map_err(table, key, e))?;

        Ok(())
    }

    fn delete_item_sync(&self, table: &str, key: &str) -> StorageResult<Option<Document>> {
        let quoted = Self::quoted(table)?;
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let raw = tx
            .query_row(
                &format!("SELECT doc FROM {} WHERE pk = ?1", quoted),
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| Self::map_err(table, key, e))?;

        if raw.is_some() {
            tx.execute(&format!("DELETE FROM {} WHERE pk = ?1", quoted), params![key])
                .map_err(|e| Self::map_err(table, key, e))?;
        }

        tx.commit()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        raw.as_deref().map(Self::decode).transpose()
    }

    fn scan_sync(&self, table: &str) -> StorageResult<Vec<Document>> {
        let quoted = Self::quoted(table)?;
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(&format!("SELECT doc FROM {}", quoted))
            .map_err(|e| Self::map_err(table, "", e))?;

        let raws = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Self::map_err(table, "", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        raws.iter().map(|raw| Self::decode(raw)).collect()
    }

    fn batch_write_sync(&self, table: &str, items: &[(String, Document)]) -> StorageResult<()> {
        let quoted = Self::quoted(table)?;
        let encoded = items
            .iter()
            .map(|(key, doc)| -> StorageResult<(&str, String)> {
                Ok((key.as_str(), Self::encode(key, doc)?))
            })
            .collect::<StorageResult<Vec<_>>>()?;

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT OR REPLACE INTO {} (pk, doc) VALUES (?1, ?2)",
                    quoted
                ))
                .map_err(|e| Self::map_err(table, "", e))?;

            for (key, doc) in &encoded {
                stmt.execute(params![key, doc])
                    .map_err(|e| Self::map_err(table, key, e))?;
            }
        }

        tx.commit()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn describe_table(&self, table: &str) -> StorageResult<Option<TableStatus>> {
        self.describe_table_sync(table)
    }

    async fn create_table(&self, table: &str, partition_key: &str) -> StorageResult<()> {
        self.create_table_sync(table, partition_key)
    }

    async fn get_item(&self, table: &str, key: &str) -> StorageResult<Option<Document>> {
        self.get_item_sync(table, key)
    }

    async fn put_item(&self, table: &str, key: &str, document: Document) -> StorageResult<()> {
        self.put_item_sync(table, key, &document)
    }

    async fn insert_item(&self, table: &str, key: &str, document: Document) -> StorageResult<()> {
        self.insert_item_sync(table, key, &document)
    }

    async fn delete_item(&self, table: &str, key: &str) -> StorageResult<Option<Document>> {
        self.delete_item_sync(table, key)
    }

    async fn scan(&self, table: &str) -> StorageResult<Vec<Document>> {
        self.scan_sync(table)
    }

    async fn batch_write(&self, table: &str, items: Vec<(String, Document)>) -> StorageResult<()> {
        self.batch_write_sync(table, &items)
    }
}
