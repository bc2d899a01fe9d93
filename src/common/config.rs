//! Environment-based Configuration for the Presale Admin Backend
//!
//! Values come from environment variables (a `.env` file is loaded first
//! when present).
//!
//! # Environment Variables
//!
//! ## Deployment
//! - `PRESALE_ENV` - "production", "staging", or "development" (default: "development")
//! - `PRESALE_API_PORT` - REST API port (default: 3001)
//!
//! ## Storage
//! - `PRESALE_STORE` - "sqlite" or "memory" (default: "sqlite")
//! - `PRESALE_DB_PATH` - SQLite database file (default: "data/presale.db")
//! - `PRESALE_WHITELIST_TABLE` - Whitelist table name (default: "presale-whitelist")
//! - `PRESALE_TABLE_POLL_MS` - Delay between table readiness polls (default: 500)
//! - `PRESALE_TABLE_POLL_ATTEMPTS` - Readiness polls before giving up (default: 20)
//!
//! ## Behaviour
//! - `PRESALE_ON_STORE_ERROR` - "fallback" or "propagate" (default: "fallback")
//! - `PRESALE_LOG_LEVEL` - Logging level (debug, info, warn, error)

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::storage::validate_table_name;
use crate::whitelist::OnStoreError;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("{0} not allowed in production")]
    NotAllowedInProduction(String),
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Staging,
    Development,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" | "stage" => Ok(Environment::Staging),
            "development" | "dev" => Ok(Environment::Development),
            _ => Err(ConfigError::InvalidValue(
                "PRESALE_ENV".to_string(),
                format!("unknown environment: {}", s),
            )),
        }
    }
}

impl Environment {
    /// JSON logs are used outside development
    pub fn json_logs(&self) -> bool {
        !matches!(self, Environment::Development)
    }
}

/// Which document store backs the whitelist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// SQLite file at the given path
    Sqlite(PathBuf),
    /// Process-local, non-durable
    Memory,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct PresaleConfig {
    pub environment: Environment,

    /// REST API port
    pub api_port: u16,

    pub store: StoreBackend,

    /// Whitelist table name
    pub whitelist_table: String,

    /// Delay between table readiness polls
    pub table_poll_interval: Duration,

    /// Readiness polls before provisioning times out
    pub table_poll_attempts: u32,

    /// What handlers do when the store fails
    pub on_store_error: OnStoreError,

    pub log_level: String,
}

impl Default for PresaleConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            api_port: 3001,
            store: StoreBackend::Sqlite(PathBuf::from("data/presale.db")),
            whitelist_table: "presale-whitelist".to_string(),
            table_poll_interval: Duration::from_millis(500),
            table_poll_attempts: 20,
            on_store_error: OnStoreError::ReturnFallback,
            log_level: "info".to_string(),
        }
    }
}

impl PresaleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        let environment: Environment = env::var("PRESALE_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .parse()?;

        let api_port = parse_env("PRESALE_API_PORT", defaults.api_port)?;

        let store = match env::var("PRESALE_STORE")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "sqlite" => StoreBackend::Sqlite(
                env::var("PRESALE_DB_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("data/presale.db")),
            ),
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::InvalidValue(
                    "PRESALE_STORE".to_string(),
                    format!("unknown store: {} (use 'sqlite' or 'memory')", other),
                ))
            }
        };

        let whitelist_table =
            env::var("PRESALE_WHITELIST_TABLE").unwrap_or(defaults.whitelist_table);
        validate_table_name(&whitelist_table).map_err(|e| {
            ConfigError::InvalidValue("PRESALE_WHITELIST_TABLE".to_string(), e.to_string())
        })?;

        let poll_ms: u64 = parse_env(
            "PRESALE_TABLE_POLL_MS",
            defaults.table_poll_interval.as_millis() as u64,
        )?;
        let table_poll_attempts = parse_env("PRESALE_TABLE_POLL_ATTEMPTS", defaults.table_poll_attempts)?;

        let on_store_error = match env::var("PRESALE_ON_STORE_ERROR") {
            Ok(value) => value.parse().map_err(|e: String| {
                ConfigError::InvalidValue("PRESALE_ON_STORE_ERROR".to_string(), e)
            })?,
            Err(_) => defaults.on_store_error,
        };

        let log_level = env::var("PRESALE_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            environment,
            api_port,
            store,
            whitelist_table,
            table_poll_interval: Duration::from_millis(poll_ms),
            table_poll_attempts,
            on_store_error,
            log_level,
        })
    }

    /// Validate configuration for production readiness
    pub fn validate_for_production(&self) -> Result<(), ConfigError> {
        if self.environment != Environment::Production {
            return Ok(());
        }

        if self.store == StoreBackend::Memory {
            return Err(ConfigError::NotAllowedInProduction(
                "in-memory store".to_string(),
            ));
        }

        if self.table_poll_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "PRESALE_TABLE_POLL_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Log a configuration summary
    pub fn log_summary(&self) {
        let store = match &self.store {
            StoreBackend::Sqlite(path) => format!("sqlite ({})", path.display()),
            StoreBackend::Memory => "memory".to_string(),
        };

        tracing::info!(
            environment = ?self.environment,
            api_port = self.api_port,
            store = %store,
            whitelist_table = %self.whitelist_table,
            on_store_error = ?self.on_store_error,
            log_level = %self.log_level,
            "presale admin configuration loaded"
        );
    }
}

/// Parse an optional numeric env var, falling back to `default` when unset
fn parse_env<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value.parse().map_err(|_| {
            ConfigError::InvalidValue(var_name.to_string(), "must be a number".to_string())
        }),
        Err(_) => Ok(default),
    }
}
