//! Shared Types Module
//!
//! Data types shared across the presale admin backend.

pub mod whitelist;

// Re-exports for convenience
pub use whitelist::{
    AddRequest, BulkAddOutcome, BulkAddRequest, BulkAddResponse, EntryResponse, EntryStatus,
    NewWhitelistEntry, RemoveRequest, UpdateRequest, WhitelistEntry, WhitelistPatch, WhitelistRow,
};
