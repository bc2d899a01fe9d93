//! Whitelist Store
//!
//! Durable mapping from wallet address to whitelist entry over one
//! document-store table keyed by `address`. Backing-store errors are
//! returned to the caller as `WhitelistError::Storage`; nothing here retries
//! or degrades.

use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

use super::provision::{self, ProvisionConfig};
use super::WhitelistError;
use crate::common::logging::log_whitelist_event;
use crate::storage::{Document, DocumentStore, StorageError};
use crate::types::whitelist::{
    address_problem, BulkAddOutcome, NewWhitelistEntry, WhitelistEntry, WhitelistPatch,
};

/// Partition key of the whitelist table
pub const PARTITION_KEY: &str = "address";

/// Whitelist persistence over a shared document store
#[derive(Clone)]
pub struct WhitelistStore {
    store: Arc<dyn DocumentStore>,
    table: String,
    provisioning: ProvisionConfig,
}

impl WhitelistStore {
    pub fn new(store: Arc<dyn DocumentStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            provisioning: ProvisionConfig::default(),
        }
    }

    pub fn with_provisioning(mut self, provisioning: ProvisionConfig) -> Self {
        self.provisioning = provisioning;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table if needed and wait until it is active
    pub async fn ensure_table(&self) -> Result<(), WhitelistError> {
        provision::ensure_table(
            self.store.as_ref(),
            &self.table,
            PARTITION_KEY,
            self.provisioning,
        )
        .await?;
        Ok(())
    }

    /// Add a new entry
    ///
    /// The existence check up front gives the explicit error; the conditional
    /// insert catches a concurrent add that slipped in between.
    pub async fn add(
        &self,
        address: &str,
        data: NewWhitelistEntry,
    ) -> Result<WhitelistEntry, WhitelistError> {
        if self.get(address).await?.is_some() {
            return Err(WhitelistError::AlreadyWhitelisted(address.to_string()));
        }

        let entry = WhitelistEntry::new(address, data, Utc::now());
        match self
            .store
            .insert_item(&self.table, address, to_document(&entry)?)
            .await
        {
            Ok(()) => {}
            Err(StorageError::Duplicate(_)) => {
                return Err(WhitelistError::AlreadyWhitelisted(address.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        log_whitelist_event("whitelist_add", address, Some(entry.allocation));
        Ok(entry)
    }

    /// Look up an entry; absence is `Ok(None)`
    pub async fn get(&self, address: &str) -> Result<Option<WhitelistEntry>, WhitelistError> {
        let doc = self.store.get_item(&self.table, address).await?;
        Ok(doc.map(from_document).transpose()?)
    }

    /// Hard-delete an entry, returning the deleted snapshot
    pub async fn remove(&self, address: &str) -> Result<WhitelistEntry, WhitelistError> {
        let doc = self
            .store
            .delete_item(&self.table, address)
            .await?
            .ok_or_else(|| WhitelistError::NotWhitelisted(address.to_string()))?;

        let entry = from_document(doc)?;
        log_whitelist_event("whitelist_remove", address, Some(entry.allocation));
        Ok(entry)
    }

    /// All entries, unordered
    pub async fn list(&self) -> Result<Vec<WhitelistEntry>, WhitelistError> {
        let docs = self.store.scan(&self.table).await?;
        Ok(docs
            .into_iter()
            .map(from_document)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Add many addresses with one allocation
    ///
    /// Addresses are processed in order, so a repeat inside the batch sees
    /// the entry written moments earlier and is skipped. Malformed addresses
    /// are skipped too. A failure on one address skips that address and the
    /// batch carries on.
    pub async fn bulk_add(&self, addresses: &[String], allocation: u64) -> BulkAddOutcome {
        let mut outcome = BulkAddOutcome::default();

        for address in addresses {
            if address_problem(address).is_some() {
                outcome.record_skipped(address.as_str());
                continue;
            }

            match self
                .add(address, NewWhitelistEntry::with_allocation(allocation))
                .await
            {
                Ok(entry) => outcome.record_added(entry),
                Err(WhitelistError::AlreadyWhitelisted(_)) => outcome.record_skipped(address.as_str()),
                Err(e) => {
                    warn!(address = %address, error = %e, "bulk add failed for address, skipping");
                    outcome.record_skipped(address.as_str());
                }
            }
        }

        outcome
    }

    /// Apply a typed partial update to an existing entry
    pub async fn update(
        &self,
        address: &str,
        patch: &WhitelistPatch,
    ) -> Result<WhitelistEntry, WhitelistError> {
        let mut entry = self
            .get(address)
            .await?
            .ok_or_else(|| WhitelistError::NotWhitelisted(address.to_string()))?;

        patch.apply(&mut entry, Utc::now());
        self.store
            .put_item(&self.table, address, to_document(&entry)?)
            .await?;

        log_whitelist_event("whitelist_update", address, Some(entry.allocation));
        Ok(entry)
    }

    /// Write entries in one batch, replacing any with the same address
    pub async fn seed(&self, entries: &[WhitelistEntry]) -> Result<usize, WhitelistError> {
        let items = entries
            .iter()
            .map(|entry| -> Result<(String, Document), StorageError> {
                Ok((entry.address.clone(), to_document(entry)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = items.len();
        self.store.batch_write(&self.table, items).await?;
        Ok(count)
    }
}

fn to_document(entry: &WhitelistEntry) -> Result<Document, StorageError> {
    serde_json::to_value(entry).map_err(|e| StorageError::InvalidData(e.to_string()))
}

fn from_document(doc: Document) -> Result<WhitelistEntry, StorageError> {
    serde_json::from_value(doc).map_err(|e| StorageError::InvalidData(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryDocumentStore, MockDocumentStore, SqliteDocumentStore};
    use crate::types::whitelist::EntryStatus;
    use std::time::Duration;

    fn fast() -> ProvisionConfig {
        ProvisionConfig {
            poll_interval: Duration::from_millis(1),
            max_polls: 5,
        }
    }

    async fn memory_store() -> WhitelistStore {
        let store = WhitelistStore::new(Arc::new(MemoryDocumentStore::new()), "wl")
            .with_provisioning(fast());
        store.ensure_table().await.unwrap();
        store
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let store = memory_store().await;

        store.add("W1", NewWhitelistEntry::default()).await.unwrap();

        let entry = store.get("W1").await.unwrap().unwrap();
        assert_eq!(entry.address, "W1");
        assert_eq!(entry.status, EntryStatus::Active);
        assert_eq!(entry.allocation, 0);
        assert_eq!(entry.email, "");
    }

    #[tokio::test]
    async fn test_duplicate_add_keeps_original() {
        let store = memory_store().await;

        store
            .add(
                "W1",
                NewWhitelistEntry {
                    email: Some("first@example.com".to_string()),
                    allocation: Some(100),
                },
            )
            .await
            .unwrap();

        let second = store
            .add(
                "W1",
                NewWhitelistEntry {
                    email: Some("second@example.com".to_string()),
                    allocation: Some(999),
                },
            )
            .await;
        assert!(matches!(second, Err(WhitelistError::AlreadyWhitelisted(_))));

        let entry = store.get("W1").await.unwrap().unwrap();
        assert_eq!(entry.allocation, 100);
        assert_eq!(entry.email, "first@example.com");
    }

    #[tokio::test]
    async fn test_remove_missing() {
        let store = memory_store().await;
        let result = store.remove("ghost").await;

        assert!(matches!(result, Err(WhitelistError::NotWhitelisted(_))));
    }

    #[tokio::test]
    async fn test_remove_then_get() {
        let store = memory_store().await;
        store
            .add("W1", NewWhitelistEntry::with_allocation(5))
            .await
            .unwrap();

        let removed = store.remove("W1").await.unwrap();
        assert_eq!(removed.allocation, 5);
        assert!(store.get("W1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_counts() {
        let store = memory_store().await;
        for address in ["A", "B", "C"] {
            store.add(address, NewWhitelistEntry::default()).await.unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 3);

        store.remove("B").await.unwrap();
        let mut remaining: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.address)
            .collect();
        remaining.sort();
        assert_eq!(remaining, strings(&["A", "C"]));
    }

    #[tokio::test]
    async fn test_bulk_add_skips_existing() {
        let store = memory_store().await;
        store.add("A", NewWhitelistEntry::default()).await.unwrap();

        let outcome = store.bulk_add(&strings(&["A", "B"]), 500).await;

        assert_eq!(outcome.added_count, 1);
        assert_eq!(outcome.skipped_count, 1);
        assert_eq!(outcome.users[0].address, "B");
        assert_eq!(outcome.users[0].allocation, 500);
        assert_eq!(outcome.skipped_addresses, strings(&["A"]));
        // existing entry is not merged
        assert_eq!(store.get("A").await.unwrap().unwrap().allocation, 0);
    }

    #[tokio::test]
    async fn test_bulk_add_repeat_within_batch() {
        let store = memory_store().await;

        let outcome = store.bulk_add(&strings(&["X", "Y", "X"]), 10).await;

        assert_eq!(outcome.added_count, 2);
        assert_eq!(outcome.skipped_addresses, strings(&["X"]));
        assert_eq!(store.get("X").await.unwrap().unwrap().allocation, 10);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_add_skips_malformed_addresses() {
        let store = memory_store().await;
        let long = "a".repeat(500);

        let outcome = store
            .bulk_add(&strings(&["two words", long.as_str(), "update", "ok"]), 1)
            .await;

        assert_eq!(outcome.added_count, 1);
        assert_eq!(outcome.skipped_addresses, strings(&["two words", long.as_str(), "update"]));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_add_tolerates_failures() {
        let mut mock = MockDocumentStore::new();
        mock.expect_get_item().returning(|_, key| {
            if key == "bad" {
                Err(StorageError::Connection("reset".to_string()))
            } else {
                Ok(None)
            }
        });
        mock.expect_insert_item().returning(|_, _, _| Ok(()));

        let store = WhitelistStore::new(Arc::new(mock), "wl");
        let outcome = store.bulk_add(&strings(&["good", "bad", "", "fine"]), 1).await;

        assert_eq!(outcome.added_count, 2);
        assert_eq!(outcome.skipped_addresses, strings(&["bad", ""]));
    }

    #[tokio::test]
    async fn test_concurrent_insert_reported_as_duplicate() {
        let mut mock = MockDocumentStore::new();
        mock.expect_get_item().returning(|_, _| Ok(None));
        mock.expect_insert_item()
            .returning(|_, key, _| Err(StorageError::Duplicate(key.to_string())));

        let store = WhitelistStore::new(Arc::new(mock), "wl");
        let result = store.add("W1", NewWhitelistEntry::default()).await;

        assert!(matches!(result, Err(WhitelistError::AlreadyWhitelisted(_))));
    }

    #[tokio::test]
    async fn test_storage_errors_surface() {
        let backend = MemoryDocumentStore::new();
        let store = WhitelistStore::new(Arc::new(backend.clone()), "wl").with_provisioning(fast());
        store.ensure_table().await.unwrap();
        backend.set_available(false);

        assert!(matches!(
            store.list().await,
            Err(WhitelistError::Storage(StorageError::Connection(_)))
        ));
        assert!(matches!(
            store.ensure_table().await,
            Err(WhitelistError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_update_patch() {
        let store = memory_store().await;
        store
            .add(
                "W1",
                NewWhitelistEntry {
                    email: Some("ops@example.com".to_string()),
                    allocation: Some(10),
                },
            )
            .await
            .unwrap();

        let patch = WhitelistPatch {
            allocation: Some(75),
            ..Default::default()
        };
        let updated = store.update("W1", &patch).await.unwrap();
        assert_eq!(updated.allocation, 75);
        assert_eq!(updated.email, "ops@example.com");

        let stored = store.get("W1").await.unwrap().unwrap();
        assert_eq!(stored, updated);

        let missing = store.update("ghost", &patch).await;
        assert!(matches!(missing, Err(WhitelistError::NotWhitelisted(_))));
    }

    #[tokio::test]
    async fn test_seed_and_sqlite_backend() {
        let backend = Arc::new(SqliteDocumentStore::in_memory().unwrap());
        let store = WhitelistStore::new(backend, "presale-whitelist").with_provisioning(fast());
        store.ensure_table().await.unwrap();

        let entries = vec![
            WhitelistEntry::new("A", NewWhitelistEntry::with_allocation(1), Utc::now()),
            WhitelistEntry::new("B", NewWhitelistEntry::with_allocation(2), Utc::now()),
        ];
        assert_eq!(store.seed(&entries).await.unwrap(), 2);

        assert_eq!(store.list().await.unwrap().len(), 2);
        let dup = store.add("A", NewWhitelistEntry::default()).await;
        assert!(matches!(dup, Err(WhitelistError::AlreadyWhitelisted(_))));
    }
}
