//! Whitelist Types
//!
//! Entries, partial updates and the request/response shapes of the
//! whitelist API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a whitelist entry
///
/// New rows start `Active`. `Removed` is set on the snapshot returned by a
/// removal, or written explicitly through an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Active,
    Removed,
}

impl Default for EntryStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "Active",
            Self::Removed => "Removed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "removed" => Ok(Self::Removed),
            _ => Err(format!("unknown status: {}", s)),
        }
    }
}

/// Longest wallet address accepted
pub const MAX_ADDRESS_LEN: usize = 128;

/// Path segments under `/whitelist` that cannot double as addresses
pub const RESERVED_ADDRESSES: [&str; 4] = ["add", "bulk-add", "remove", "update"];

/// Why `address` cannot be whitelisted, `None` if it can
///
/// Chains differ in address format, so only shape is checked. Every path that
/// creates entries applies this rule, so anything stored can also be looked
/// up and removed.
pub fn address_problem(address: &str) -> Option<String> {
    if address.trim().is_empty() {
        return Some("Address is required".to_string());
    }

    if address.len() > MAX_ADDRESS_LEN {
        return Some(format!(
            "Address must not exceed {} characters",
            MAX_ADDRESS_LEN
        ));
    }

    if address.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Some("Address must not contain whitespace".to_string());
    }

    if RESERVED_ADDRESSES.contains(&address) {
        return Some(format!("Address {:?} is reserved", address));
    }

    None
}

/// A wallet address permitted to take part in the presale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistEntry {
    /// Wallet address (partition key)
    pub address: String,
    /// Contact email, empty when unknown
    #[serde(default)]
    pub email: String,
    /// Token units reserved for this address
    #[serde(default)]
    pub allocation: u64,
    #[serde(default)]
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WhitelistEntry {
    /// Create an active entry, letting `data` override the defaults
    pub fn new(address: impl Into<String>, data: NewWhitelistEntry, now: DateTime<Utc>) -> Self {
        Self {
            address: address.into(),
            email: data.email.unwrap_or_default(),
            allocation: data.allocation.unwrap_or(0),
            status: EntryStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshot of this entry as it looks after removal
    pub fn into_removed(mut self) -> Self {
        self.status = EntryStatus::Removed;
        self
    }

    /// Date portion of `created_at` (YYYY-MM-DD)
    pub fn date_added(&self) -> String {
        self.created_at.date_naive().to_string()
    }
}

/// Caller-supplied fields for a new entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewWhitelistEntry {
    pub email: Option<String>,
    pub allocation: Option<u64>,
}

impl NewWhitelistEntry {
    /// Entry data carrying only an allocation (bulk path)
    pub fn with_allocation(allocation: u64) -> Self {
        Self {
            email: None,
            allocation: Some(allocation),
        }
    }
}

/// Typed partial update: only the fields that are `Some` are written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhitelistPatch {
    pub email: Option<String>,
    pub allocation: Option<u64>,
    pub status: Option<EntryStatus>,
}

impl WhitelistPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.allocation.is_none() && self.status.is_none()
    }

    /// Apply the patch and touch `updated_at`
    pub fn apply(&self, entry: &mut WhitelistEntry, now: DateTime<Utc>) {
        if let Some(email) = &self.email {
            entry.email = email.clone();
        }
        if let Some(allocation) = self.allocation {
            entry.allocation = allocation;
        }
        if let Some(status) = self.status {
            entry.status = status;
        }
        entry.updated_at = now;
    }
}

/// Result of a bulk add
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAddOutcome {
    pub added_count: usize,
    pub skipped_count: usize,
    pub users: Vec<WhitelistEntry>,
    pub skipped_addresses: Vec<String>,
}

impl BulkAddOutcome {
    pub fn record_added(&mut self, entry: WhitelistEntry) {
        self.users.push(entry);
        self.added_count = self.users.len();
    }

    pub fn record_skipped(&mut self, address: impl Into<String>) {
        self.skipped_addresses.push(address.into());
        self.skipped_count = self.skipped_addresses.len();
    }
}

// =============================================================================
// API Types
// =============================================================================

/// Row shape rendered by the dashboard table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhitelistRow {
    pub id: String,
    pub address: String,
    pub email: String,
    pub allocation: u64,
    pub date_added: String,
    pub status: EntryStatus,
}

impl From<&WhitelistEntry> for WhitelistRow {
    fn from(entry: &WhitelistEntry) -> Self {
        Self {
            id: entry.address.clone(),
            address: entry.address.clone(),
            email: entry.email.clone(),
            allocation: entry.allocation,
            date_added: entry.date_added(),
            status: entry.status,
        }
    }
}

/// POST /whitelist/add
#[derive(Debug, Default, Deserialize)]
pub struct AddRequest {
    pub address: Option<String>,
    pub allocation: Option<i64>,
    pub email: Option<String>,
}

/// POST /whitelist/bulk-add
///
/// `addresses` stays untyped so a non-array value can be reported as a
/// validation error instead of a body rejection.
#[derive(Debug, Default, Deserialize)]
pub struct BulkAddRequest {
    pub addresses: Option<serde_json::Value>,
    pub allocation: Option<i64>,
}

/// DELETE /whitelist/remove
#[derive(Debug, Default, Deserialize)]
pub struct RemoveRequest {
    pub address: Option<String>,
}

/// PUT /whitelist/update
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    pub address: Option<String>,
    pub email: Option<String>,
    pub allocation: Option<i64>,
    pub status: Option<EntryStatus>,
}

/// `{success, user}` body for single-entry writes
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub success: bool,
    pub user: WhitelistEntry,
}

/// `{success, addedCount, skippedCount, users, skippedAddresses}`
#[derive(Debug, Serialize)]
pub struct BulkAddResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: BulkAddOutcome,
}
