//! LMDB storage backend for validation records.
//!
//! Implements [`linkid_store::ValidationStore`] using the `heed` LMDB
//! bindings. Records are bincode-encoded and keyed by raw request id bytes.

pub mod environment;
pub mod error;
pub mod validation;

pub use environment::{LmdbEnvironment, DEFAULT_MAP_SIZE};
pub use error::LmdbError;
pub use validation::LmdbValidationStore;
