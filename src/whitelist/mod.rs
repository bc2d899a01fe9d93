//! Whitelist Module
//!
//! Wallet whitelist persistence and its degraded-mode data:
//!
//! - **store**: add / get / remove / list / bulk add / update over a document table
//! - **provision**: lazy table creation with readiness polling
//! - **fallback**: static stand-in data and the store-error policy

pub mod fallback;
pub mod provision;
pub mod store;

use thiserror::Error;

use crate::storage::StorageError;

// Re-exports
pub use fallback::{FallbackData, FallbackList, OnStoreError};
pub use provision::{ensure_table, ProvisionConfig};
pub use store::{WhitelistStore, PARTITION_KEY};

/// Whitelist operation errors
#[derive(Debug, Error)]
pub enum WhitelistError {
    #[error("address is already whitelisted: {0}")]
    AlreadyWhitelisted(String),

    #[error("address is not whitelisted: {0}")]
    NotWhitelisted(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl WhitelistError {
    pub fn error_code(&self) -> &'static str {
        match self {
            WhitelistError::AlreadyWhitelisted(_) => "ALREADY_WHITELISTED",
            WhitelistError::NotWhitelisted(_) => "NOT_WHITELISTED",
            WhitelistError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
