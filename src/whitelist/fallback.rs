//! Fallback Data
//!
//! Static stand-in data served when the document store fails, so the
//! dashboard keeps rendering. Nothing written here is persisted: every
//! request works on its own copy of the seed list.

use chrono::{DateTime, Utc};
use std::str::FromStr;

use super::WhitelistError;
use crate::types::whitelist::{
    address_problem, BulkAddOutcome, EntryStatus, NewWhitelistEntry, WhitelistEntry,
    WhitelistPatch,
};

/// What route handlers do when the store returns an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnStoreError {
    /// Log the error and answer from fallback data
    #[default]
    ReturnFallback,
    /// Surface the error to the client as a 500
    Propagate,
}

impl FromStr for OnStoreError {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fallback" | "return_fallback" => Ok(Self::ReturnFallback),
            "propagate" | "strict" => Ok(Self::Propagate),
            _ => Err(format!(
                "unknown store error policy: {} (use 'fallback' or 'propagate')",
                s
            )),
        }
    }
}

/// Provider of fallback whitelist data
#[derive(Debug, Clone)]
pub struct FallbackData {
    seed: Vec<WhitelistEntry>,
}

impl FallbackData {
    pub fn new(seed: Vec<WhitelistEntry>) -> Self {
        Self { seed }
    }

    /// The fixed four-entry demo list
    pub fn demo() -> Self {
        let entry = |address: &str, email: &str, allocation: u64, ts: i64| {
            let at = seeded_at(ts);
            WhitelistEntry {
                address: address.to_string(),
                email: email.to_string(),
                allocation,
                status: EntryStatus::Active,
                created_at: at,
                updated_at: at,
            }
        };

        Self::new(vec![
            entry(
                "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU",
                "alice@example.com",
                50_000,
                1_705_312_800,
            ),
            entry(
                "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
                "bob@example.com",
                25_000,
                1_705_917_600,
            ),
            entry(
                "HN7cABqLq46Es1jh92dQQisAq662SmxELLLsHHe4YWrH",
                "carol@example.com",
                100_000,
                1_706_522_400,
            ),
            entry(
                "3Kz8VnB6ho1c4kQkpYJ6kDJ2pQd8tZ5yvWqL2uXyR7mN",
                "",
                10_000,
                1_707_127_200,
            ),
        ])
    }

    /// Copy of the seed entries
    pub fn entries(&self) -> Vec<WhitelistEntry> {
        self.seed.clone()
    }

    /// Fresh, request-scoped list to simulate writes against
    pub fn session(&self) -> FallbackList {
        FallbackList {
            entries: self.entries(),
        }
    }
}

impl Default for FallbackData {
    fn default() -> Self {
        Self::demo()
    }
}

fn seeded_at(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

/// Request-scoped fallback list with the same rules as the real store
#[derive(Debug, Clone)]
pub struct FallbackList {
    entries: Vec<WhitelistEntry>,
}

impl FallbackList {
    pub fn get(&self, address: &str) -> Option<&WhitelistEntry> {
        self.entries.iter().find(|e| e.address == address)
    }

    pub fn add(
        &mut self,
        address: &str,
        data: NewWhitelistEntry,
    ) -> Result<WhitelistEntry, WhitelistError> {
        if self.get(address).is_some() {
            return Err(WhitelistError::AlreadyWhitelisted(address.to_string()));
        }

        let entry = WhitelistEntry::new(address, data, Utc::now());
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Remove an entry; the snapshot comes back marked `Removed`
    pub fn remove(&mut self, address: &str) -> Result<WhitelistEntry, WhitelistError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.address == address)
            .ok_or_else(|| WhitelistError::NotWhitelisted(address.to_string()))?;

        Ok(self.entries.remove(index).into_removed())
    }

    pub fn bulk_add(&mut self, addresses: &[String], allocation: u64) -> BulkAddOutcome {
        let mut outcome = BulkAddOutcome::default();

        for address in addresses {
            if address_problem(address).is_some() {
                outcome.record_skipped(address.as_str());
                continue;
            }

            match self.add(address, NewWhitelistEntry::with_allocation(allocation)) {
                Ok(entry) => outcome.record_added(entry),
                Err(_) => outcome.record_skipped(address.as_str()),
            }
        }

        outcome
    }

    pub fn update(
        &mut self,
        address: &str,
        patch: &WhitelistPatch,
    ) -> Result<WhitelistEntry, WhitelistError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.address == address)
            .ok_or_else(|| WhitelistError::NotWhitelisted(address.to_string()))?;

        patch.apply(entry, Utc::now());
        Ok(entry.clone())
    }

    pub fn into_entries(self) -> Vec<WhitelistEntry> {
        self.entries
    }
}
