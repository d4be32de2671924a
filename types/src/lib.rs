//! Fundamental types for identifier linking.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! addresses, identifier and request digests, signatures, ballots, and timestamps.

pub mod address;
pub mod ballot;
pub mod error;
pub mod hash;
pub mod identifier;
pub mod keys;
pub mod time;

pub use address::Address;
pub use ballot::Ballot;
pub use error::TypesError;
pub use hash::{IdentifierHash, RequestId};
pub use identifier::IdentifierKind;
pub use keys::{PrivateKey, Signature};
pub use time::{Clock, SystemClock, Timestamp};
