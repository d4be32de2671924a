//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies of the validator node (wall-clock time, the
//! validation store) sit behind traits. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod store;

pub use clock::NullClock;
pub use store::NullValidationStore;
