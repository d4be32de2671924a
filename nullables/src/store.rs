//! Nullable store: thread-safe in-memory validation storage for testing.

use linkid_store::{StoreError, ValidationRecord, ValidationStore};
use linkid_types::RequestId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// An in-memory validation store.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullValidationStore {
    records: Mutex<HashMap<RequestId, ValidationRecord>>,
    failing: AtomicBool,
}

impl NullValidationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, e.g. to simulate records left by a previous run.
    pub fn with_records(records: impl IntoIterator<Item = ValidationRecord>) -> Self {
        let store = Self::new();
        store
            .lock()
            .extend(records.into_iter().map(|r| (r.request_id, r)));
        store
    }

    /// Make every subsequent call fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, ValidationRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Backend("null store set to fail".into()))
        } else {
            Ok(())
        }
    }
}

impl ValidationStore for NullValidationStore {
    fn create(&self, record: &ValidationRecord) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.lock();
        if records.contains_key(&record.request_id) {
            return Err(StoreError::Duplicate(record.request_id.to_string()));
        }
        records.insert(record.request_id, record.clone());
        Ok(())
    }

    fn update(&self, record: &ValidationRecord) -> Result<(), StoreError> {
        self.check()?;
        match self.lock().get_mut(&record.request_id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(record.request_id.to_string())),
        }
    }

    fn get(&self, id: &RequestId) -> Result<Option<ValidationRecord>, StoreError> {
        self.check()?;
        Ok(self.lock().get(id).cloned())
    }

    fn delete(&self, id: &RequestId) -> Result<(), StoreError> {
        self.check()?;
        self.lock().remove(id);
        Ok(())
    }

    fn all(&self) -> Result<Vec<ValidationRecord>, StoreError> {
        self.check()?;
        Ok(self.lock().values().cloned().collect())
    }
}
