//! HTTP access to a shared link collection.
//!
//! Provides:
//! - [`LedgerServer`]: an axum service owning one collection
//! - [`RemoteLedger`]: a [`linkid_ledger::LedgerClient`] speaking to it
//! - [`CallAuth`]: signed, sequenced authorisation for sender-bound writes

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod server;

pub use auth::{CallAuth, SequenceGuard};
pub use client::RemoteLedger;
pub use config::LedgerServiceConfig;
pub use error::RpcError;
pub use server::LedgerServer;
