//! Per-request validation state on this node.
//!
//! Every mutation is written through to the [`ValidationStore`] so a
//! restarted node can resume its queued work. Store failures are logged;
//! the in-memory state stays authoritative for the running process.

use std::collections::HashMap;
use std::sync::Arc;

use linkid_store::{ProcessStep, StoreError, ValidationRecord, ValidationStatus, ValidationStore};
use linkid_types::{Clock, RequestId};
use thiserror::Error;
use tracing::{debug, error};

use crate::code::slice_for;
use crate::wire::codes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Unknown request")]
    Unknown,
    #[error("Code has not been sent yet")]
    NotSent,
    #[error("Request already confirmed")]
    AlreadyConfirmed,
    #[error("Code has expired")]
    Expired,
    #[error("Code does not match")]
    Mismatch,
}

impl SubmitError {
    /// Envelope code reported to the caller.
    pub fn code(&self) -> u16 {
        match self {
            SubmitError::Unknown => codes::UNKNOWN_REQUEST,
            SubmitError::NotSent => codes::CODE_NOT_SENT,
            SubmitError::AlreadyConfirmed => codes::ALREADY_CONFIRMED,
            SubmitError::Expired => codes::CODE_EXPIRED,
            SubmitError::Mismatch => codes::INVALID_SIGNATURE,
        }
    }
}

pub struct ValidationTracker {
    records: HashMap<RequestId, ValidationRecord>,
    store: Arc<dyn ValidationStore>,
    clock: Arc<dyn Clock>,
    code_ttl_secs: u64,
    retention_secs: u64,
}

impl ValidationTracker {
    pub fn new(
        store: Arc<dyn ValidationStore>,
        clock: Arc<dyn Clock>,
        code_ttl_secs: u64,
        retention_secs: u64,
    ) -> Self {
        Self {
            records: HashMap::new(),
            store,
            clock,
            code_ttl_secs,
            retention_secs,
        }
    }

    /// Start tracking a request. Returns `false` if it is already tracked.
    pub fn insert(&mut self, mut record: ValidationRecord) -> bool {
        if self.records.contains_key(&record.request_id) {
            return false;
        }
        record.updated_at = self.clock.now();
        self.persist(&record);
        self.records.insert(record.request_id, record);
        true
    }

    pub fn get(&self, id: &RequestId) -> Option<&ValidationRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn set_step(&mut self, id: &RequestId, step: ProcessStep) -> bool {
        self.modify(id, |r| r.step = step)
    }

    /// Record a freshly issued code and start its expiry clock.
    ///
    /// Returns the recipient, or `None` if the request is not tracked or a
    /// code was already issued for it.
    pub fn on_send_code(&mut self, id: &RequestId, code: String) -> Option<String> {
        let record = self.records.get(id)?;
        if record.status != ValidationStatus::None {
            return None;
        }
        let expire = self.clock.now().plus(self.code_ttl_secs);
        let recipient = record.identifier.clone();
        self.modify(id, |r| {
            r.send_code = code;
            r.status = ValidationStatus::Sent;
            r.expire = expire;
            r.step = ProcessStep::SentCode;
        });
        Some(recipient)
    }

    /// Check a submitted code against this validator's slice.
    ///
    /// A mismatch leaves the record unchanged so the user may retry until
    /// the code expires.
    pub fn on_submit_code(
        &mut self,
        id: &RequestId,
        combined: &str,
        index: u32,
    ) -> Result<(), SubmitError> {
        let now = self.clock.now();
        let record = self.records.get(id).ok_or(SubmitError::Unknown)?;
        match record.status {
            ValidationStatus::None => return Err(SubmitError::NotSent),
            ValidationStatus::Confirmed => return Err(SubmitError::AlreadyConfirmed),
            ValidationStatus::Expired => return Err(SubmitError::Expired),
            ValidationStatus::Sent => {}
        }
        if now >= record.expire {
            return Err(SubmitError::Expired);
        }
        let slice = slice_for(combined, index).ok_or(SubmitError::Mismatch)?;
        if slice != record.send_code {
            return Err(SubmitError::Mismatch);
        }
        let slice = slice.to_string();
        self.modify(id, |r| {
            r.receive_code = slice;
            r.status = ValidationStatus::Confirmed;
            r.step = ProcessStep::ReceivedCode;
        });
        Ok(())
    }

    /// Expire every sent code past its deadline; returns the affected ids.
    pub fn expire_due(&mut self) -> Vec<RequestId> {
        let now = self.clock.now();
        let due: Vec<RequestId> = self
            .records
            .values()
            .filter(|r| r.status == ValidationStatus::Sent && now >= r.expire)
            .map(|r| r.request_id)
            .collect();
        for id in &due {
            self.modify(id, |r| {
                r.status = ValidationStatus::Expired;
                r.step = ProcessStep::Expired;
            });
        }
        due
    }

    /// Forget terminal records older than the retention window. They stay
    /// in the store.
    pub fn purge_finished(&mut self) -> usize {
        let now = self.clock.now();
        let retention = self.retention_secs;
        let before = self.records.len();
        self.records
            .retain(|_, r| !(r.step.is_terminal() && r.updated_at.has_expired(retention, now)));
        before - self.records.len()
    }

    /// Reload records left unfinished by a previous run.
    pub fn load_unfinished(&mut self) -> Result<Vec<ValidationRecord>, StoreError> {
        let records = self.store.unfinished()?;
        for record in &records {
            self.records.insert(record.request_id, record.clone());
        }
        debug!(count = records.len(), "reloaded unfinished validations");
        Ok(records)
    }

    fn modify(&mut self, id: &RequestId, f: impl FnOnce(&mut ValidationRecord)) -> bool {
        let now = self.clock.now();
        let Some(record) = self.records.get_mut(id) else {
            return false;
        };
        f(record);
        record.updated_at = now;
        let snapshot = record.clone();
        self.persist(&snapshot);
        true
    }

    fn persist(&self, record: &ValidationRecord) {
        if let Err(e) = self.store.put(record) {
            error!(request_id = %record.request_id, error = %e, "failed to persist validation");
        }
    }
}
