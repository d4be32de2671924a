//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use tracing::info;

use crate::validation::LmdbValidationStore;
use crate::LmdbError;

const VALIDATIONS_DB: &str = "validations";

/// Default map size: 256 MiB is far beyond what pending validations need.
pub const DEFAULT_MAP_SIZE: usize = 256 * 1024 * 1024;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    validations_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment in the directory `path`.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the directory is owned by this process; the environment is
        // opened once and shared through an `Arc`.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(4)
                .open(path)?
        };
        let mut wtxn = env.write_txn()?;
        let validations_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some(VALIDATIONS_DB))?;
        wtxn.commit()?;
        info!(path = %path.display(), "opened LMDB environment");
        Ok(Self {
            env: Arc::new(env),
            validations_db,
        })
    }

    pub fn validation_store(&self) -> LmdbValidationStore {
        LmdbValidationStore {
            env: Arc::clone(&self.env),
            validations_db: self.validations_db,
        }
    }
}
