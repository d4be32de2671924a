//! Persistence traits for validation records.
//!
//! Every storage backend (LMDB, in-memory for testing) implements
//! [`ValidationStore`]. The node depends only on the trait.

pub mod error;
pub mod record;
pub mod validation;

pub use error::StoreError;
pub use record::{ProcessStep, ValidationRecord, ValidationStatus};
pub use validation::ValidationStore;
