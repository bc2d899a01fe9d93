//! Common Error Types for the Presale Admin Backend
//!
//! Provides unified error handling across all modules.

use thiserror::Error;

use crate::storage::StorageError;
use crate::whitelist::WhitelistError;

/// Root error type for the presale admin backend
#[derive(Debug, Error)]
pub enum PresaleError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Storage errors
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Whitelist errors
    #[error("whitelist error: {0}")]
    Whitelist(#[from] WhitelistError),

    /// Validation errors
    #[error("validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PresaleError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Get error code for API responses and logs
    pub fn error_code(&self) -> &'static str {
        match self {
            PresaleError::Config(_) => "CONFIG_ERROR",
            PresaleError::Logging(_) => "LOGGING_ERROR",
            PresaleError::Storage(_) => "STORAGE_ERROR",
            PresaleError::Whitelist(e) => e.error_code(),
            PresaleError::Validation(_) => "VALIDATION_ERROR",
            PresaleError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using PresaleError
pub type Result<T> = std::result::Result<T, PresaleError>;
