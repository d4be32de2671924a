//! Ordered validator set with declared endpoints.
//!
//! Membership is fixed when the collection is created. The only mutation is
//! a validator re-declaring its own endpoint.

use linkid_types::{Address, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Status of a registry entry.
///
/// Every entry built by [`ValidatorRegistry::new`] is `Active`; no
/// transition to `Inactive` exists while membership is fixed. The variant
/// is kept as part of the entry's wire format so readers of a registry
/// (quorum counting, peer directories) already skip retired validators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorStatus {
    Active,
    /// Reserved for a retired validator.
    Inactive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorEntry {
    pub address: Address,
    pub index: u32,
    /// Empty until the validator publishes it.
    pub endpoint: String,
    pub status: ValidatorStatus,
    /// When the validator joined the set.
    pub start: Timestamp,
}

#[derive(Clone, Debug, Default)]
pub struct ValidatorRegistry {
    entries: Vec<ValidatorEntry>,
}

impl ValidatorRegistry {
    /// Build the registry from an ordered address list. Later duplicates of
    /// an address are ignored so indices stay dense.
    pub fn new(addresses: &[Address], start: Timestamp) -> Self {
        let mut entries: Vec<ValidatorEntry> = Vec::with_capacity(addresses.len());
        for address in addresses {
            if entries.iter().any(|e| e.address == *address) {
                continue;
            }
            entries.push(ValidatorEntry {
                address: *address,
                index: entries.len() as u32,
                endpoint: String::new(),
                status: ValidatorStatus::Active,
                start,
            });
        }
        Self { entries }
    }

    pub fn validators(&self) -> &[ValidatorEntry] {
        &self.entries
    }

    pub fn get(&self, index: u32) -> Result<&ValidatorEntry, LedgerError> {
        self.entries
            .get(index as usize)
            .ok_or(LedgerError::UnknownValidator(index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, address: &Address) -> Option<&ValidatorEntry> {
        self.entries.iter().find(|e| e.address == *address)
    }

    pub fn is_active(&self, address: &Address) -> bool {
        self.find(address)
            .is_some_and(|e| e.status == ValidatorStatus::Active)
    }

    /// Number of validators counted for quorum.
    pub fn active_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == ValidatorStatus::Active)
            .count()
    }

    pub fn update_endpoint(&mut self, sender: &Address, endpoint: &str) -> Result<(), LedgerError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.address == *sender)
            .ok_or(LedgerError::NotValidator)?;
        entry.endpoint = endpoint.trim().to_string();
        Ok(())
    }
}
