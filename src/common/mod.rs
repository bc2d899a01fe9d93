//! Common Infrastructure Module
//!
//! Shared utilities and configuration for the presale admin backend.
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, Environment, PresaleConfig, StoreBackend};
pub use error::{PresaleError, Result};
pub use logging::{
    generate_correlation_id, init_from_config, init_logging, log_api_request, log_api_response,
    log_fallback_event, log_whitelist_event, ErrorDetails, EventCategory, LogEvent, LogLevel,
    LoggingError,
};
