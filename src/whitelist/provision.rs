//! Lazy Table Provisioning
//!
//! Creates the backing table on first use and waits until the store reports
//! it as active. Safe to call before every operation.

use std::time::Duration;
use tracing::{debug, info};

use crate::common::logging::{EventCategory, LogEvent, LogLevel};
use crate::storage::{DocumentStore, StorageError, StorageResult, TableStatus};

/// Readiness polling settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// Delay between `describe_table` polls
    pub poll_interval: Duration,
    /// Polls before giving up with `Timeout`
    pub max_polls: u32,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_polls: 20,
        }
    }
}

/// Make sure `table` exists and is active
///
/// A table created concurrently by someone else (`TableExists`) counts as
/// success; any other creation error is returned.
pub async fn ensure_table(
    store: &dyn DocumentStore,
    table: &str,
    partition_key: &str,
    config: ProvisionConfig,
) -> StorageResult<()> {
    match store.describe_table(table).await? {
        Some(TableStatus::Active) => return Ok(()),
        Some(TableStatus::Creating) => debug!(table, "table still being created"),
        None => match store.create_table(table, partition_key).await {
            Ok(()) => {
                let event = LogEvent::new(LogLevel::Info, EventCategory::Storage, "table_created")
                    .with_data(serde_json::json!({
                        "table": table,
                        "partition_key": partition_key
                    }));
                info!(target: "presale::storage", "{}", event.to_json());
            }
            Err(StorageError::TableExists(_)) => debug!(table, "table created concurrently"),
            Err(e) => return Err(e),
        },
    }

    for attempt in 1..=config.max_polls {
        if store.describe_table(table).await? == Some(TableStatus::Active) {
            debug!(table, attempt, "table active");
            return Ok(());
        }
        tokio::time::sleep(config.poll_interval).await;
    }

    Err(StorageError::Timeout(format!(
        "table {} not active after {} polls",
        table, config.max_polls
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryDocumentStore, MockDocumentStore};

    fn fast() -> ProvisionConfig {
        ProvisionConfig {
            poll_interval: Duration::from_millis(1),
            max_polls: 5,
        }
    }

    #[tokio::test]
    async fn test_creates_missing_table() {
        let store = MemoryDocumentStore::new();

        ensure_table(&store, "wl", "address", fast()).await.unwrap();

        assert_eq!(
            store.describe_table("wl").await.unwrap(),
            Some(TableStatus::Active)
        );
        assert_eq!(store.partition_key("wl").await.as_deref(), Some("address"));
    }

    #[tokio::test]
    async fn test_waits_while_creating() {
        let store = MemoryDocumentStore::new().with_provisioning_delay(3);

        ensure_table(&store, "wl", "address", fast()).await.unwrap();
        assert!(store.scan("wl").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_idempotent() {
        let store = MemoryDocumentStore::new();

        ensure_table(&store, "wl", "address", fast()).await.unwrap();
        ensure_table(&store, "wl", "address", fast()).await.unwrap();
    }

    #[tokio::test]
    async fn test_times_out() {
        let store = MemoryDocumentStore::new().with_provisioning_delay(100);
        let result = ensure_table(&store, "wl", "address", fast()).await;

        assert!(matches!(result, Err(StorageError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_concurrent_create_is_success() {
        let mut mock = MockDocumentStore::new();
        let mut described = 0;
        mock.expect_describe_table().returning(move |_| {
            described += 1;
            Ok(if described == 1 {
                None
            } else {
                Some(TableStatus::Active)
            })
        });
        mock.expect_create_table()
            .times(1)
            .returning(|table, _| Err(StorageError::TableExists(table.to_string())));

        ensure_table(&mock, "wl", "address", fast()).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_failure_surfaces() {
        let mut mock = MockDocumentStore::new();
        mock.expect_describe_table().returning(|_| Ok(None));
        mock.expect_create_table()
            .returning(|_, _| Err(StorageError::Database("disk full".to_string())));

        let result = ensure_table(&mock, "wl", "address", fast()).await;
        assert!(matches!(result, Err(StorageError::Database(_))));
    }
}
