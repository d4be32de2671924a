//! Identifier link collection.
//!
//! The collection is the single arbiter of the protocol: it maps identifier
//! hashes to addresses one-to-one, holds pending link requests and tallies
//! validator ballots until a strict majority finalizes each request.
//! Validator nodes talk to it through the [`LedgerClient`] capability, bound
//! to the node's own address.

pub mod client;
pub mod collection;
pub mod error;
pub mod event;
pub mod registry;
pub mod request;

pub use client::{ClientError, LedgerClient, LocalLedger, LocalLedgerClient};
pub use collection::LinkCollection;
pub use error::LedgerError;
pub use event::LedgerEvent;
pub use registry::{ValidatorEntry, ValidatorRegistry, ValidatorStatus};
pub use request::{decide, RequestRecord, RequestState, Tally};
