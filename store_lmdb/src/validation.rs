//! LMDB implementation of ValidationStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use linkid_store::{StoreError, ValidationRecord, ValidationStore};
use linkid_types::RequestId;

use crate::LmdbError;

pub struct LmdbValidationStore {
    pub(crate) env: Arc<Env>,
    pub(crate) validations_db: Database<Bytes, Bytes>,
}

impl LmdbValidationStore {
    fn write(&self, record: &ValidationRecord, must_exist: bool) -> Result<(), StoreError> {
        let key = record.request_id.as_bytes();
        let value = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let exists = self
            .validations_db
            .get(&wtxn, key)
            .map_err(LmdbError::from)?
            .is_some();
        if exists != must_exist {
            return Err(if must_exist {
                StoreError::NotFound(record.request_id.to_string())
            } else {
                StoreError::Duplicate(record.request_id.to_string())
            });
        }
        self.validations_db
            .put(&mut wtxn, key, &value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

impl ValidationStore for LmdbValidationStore {
    fn create(&self, record: &ValidationRecord) -> Result<(), StoreError> {
        self.write(record, false)
    }

    fn update(&self, record: &ValidationRecord) -> Result<(), StoreError> {
        self.write(record, true)
    }

    fn get(&self, id: &RequestId) -> Result<Option<ValidationRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .validations_db
            .get(&rtxn, id.as_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn delete(&self, id: &RequestId) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.validations_db
            .delete(&mut wtxn, id.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn all(&self) -> Result<Vec<ValidationRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.validations_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut result = Vec::new();
        for entry in iter {
            let (_, val) = entry.map_err(LmdbError::from)?;
            match bincode::deserialize::<ValidationRecord>(val) {
                Ok(record) => result.push(record),
                Err(e) => tracing::warn!(error = %e, "skipping undecodable validation record"),
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{LmdbEnvironment, DEFAULT_MAP_SIZE};
    use linkid_store::{ProcessStep, ValidationStatus};
    use linkid_types::{Address, IdentifierHash, Signature, Timestamp};

    fn record(id: u8, step: ProcessStep) -> ValidationRecord {
        ValidationRecord {
            request_id: RequestId::new([id; 32]),
            identifier: "01012341000".into(),
            identifier_hash: IdentifierHash::new([2; 32]),
            address: Address::new([3; 20]),
            nonce: 0,
            request_signature: Signature([5; 65]),
            receiver: Address::new([6; 20]),
            receiver_signature: Signature([7; 65]),
            status: ValidationStatus::None,
            send_code: String::new(),
            receive_code: String::new(),
            expire: Timestamp::EPOCH,
            step,
            updated_at: Timestamp::EPOCH,
        }
    }

    fn open() -> (tempfile::TempDir, LmdbValidationStore) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
        (dir, env.validation_store())
    }

    #[test]
    fn create_then_get() {
        let (_dir, store) = open();
        let rec = record(1, ProcessStep::ReceivedRegister);
        store.create(&rec).unwrap();
        assert_eq!(store.get(&rec.request_id).unwrap(), Some(rec.clone()));
        assert!(matches!(store.create(&rec), Err(StoreError::Duplicate(_))));
    }

    #[test]
    fn update_requires_existing_record() {
        let (_dir, store) = open();
        let mut rec = record(1, ProcessStep::ReceivedRegister);
        assert!(matches!(store.update(&rec), Err(StoreError::NotFound(_))));
        store.create(&rec).unwrap();
        rec.step = ProcessStep::SentCode;
        rec.send_code = "02".into();
        store.update(&rec).unwrap();
        let back = store.get(&rec.request_id).unwrap().unwrap();
        assert_eq!(back.step, ProcessStep::SentCode);
        assert_eq!(back.send_code, "02");
    }

    #[test]
    fn unfinished_skips_terminal_steps() {
        let (_dir, store) = open();
        store.put(&record(1, ProcessStep::ReceivedBroadcast)).unwrap();
        store.put(&record(2, ProcessStep::Finished)).unwrap();
        store.put(&record(3, ProcessStep::SentCode)).unwrap();
        store.put(&record(4, ProcessStep::Expired)).unwrap();
        let mut ids: Vec<_> = store
            .unfinished()
            .unwrap()
            .into_iter()
            .map(|r| r.request_id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![RequestId::new([1; 32]), RequestId::new([3; 32])]);
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
            env.validation_store()
                .create(&record(9, ProcessStep::ReceivedCode))
                .unwrap();
        }
        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
        let store = env.validation_store();
        assert_eq!(store.all().unwrap().len(), 1);
        store.delete(&RequestId::new([9; 32])).unwrap();
        assert!(store.all().unwrap().is_empty());
    }
}
