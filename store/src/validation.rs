//! Validation record storage trait.

use linkid_types::RequestId;

use crate::record::ValidationRecord;
use crate::StoreError;

/// Keyed by request id. Implementations must be safe to share between the
/// HTTP handlers and the worker loop.
pub trait ValidationStore: Send + Sync {
    /// Insert a new record; fails with `Duplicate` if the id is taken.
    fn create(&self, record: &ValidationRecord) -> Result<(), StoreError>;

    /// Overwrite an existing record; fails with `NotFound` if absent.
    fn update(&self, record: &ValidationRecord) -> Result<(), StoreError>;

    fn get(&self, id: &RequestId) -> Result<Option<ValidationRecord>, StoreError>;

    fn delete(&self, id: &RequestId) -> Result<(), StoreError>;

    fn all(&self) -> Result<Vec<ValidationRecord>, StoreError>;

    /// Records this validator still has work for.
    fn unfinished(&self) -> Result<Vec<ValidationRecord>, StoreError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|r| !r.step.is_terminal() && r.step != crate::ProcessStep::None)
            .collect())
    }

    /// Insert or overwrite.
    fn put(&self, record: &ValidationRecord) -> Result<(), StoreError> {
        match self.get(&record.request_id)? {
            Some(_) => self.update(record),
            None => self.create(record),
        }
    }
}
