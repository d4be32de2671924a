//! Validator node for identifier linking.
//!
//! A node accepts link requests from users, writes them to the collection
//! ledger, relays them to the other validators, verifies that the user
//! controls the identifier with a split verification code, and votes.
//!
//! - [`router`]: the JSON-over-HTTP surface (`/request`, `/submit`, ...)
//! - [`worker`]: one queued job per tick, plus periodic peer refresh,
//!   health checks and expiry sweeps
//! - [`tracker`]: per-request validation state, written through to a
//!   [`linkid_store::ValidationStore`]
//! - [`peers`]: the other validators and their health

pub mod code;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod notifier;
pub mod peer_client;
pub mod peers;
pub mod queue;
pub mod router;
pub mod shutdown;
pub mod tracker;
pub mod wire;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use code::CodeGenerator;
pub use config::{AuthenticationMode, GatewayConfig, NodeConfig};
pub use context::NodeContext;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::ValidatorNode;
pub use notifier::Notifier;
pub use peer_client::{PeerClient, PeerError};
pub use peers::{Peer, PeerDirectory, PeerStatus};
pub use queue::{Job, JobKind, JobQueue};
pub use shutdown::ShutdownController;
pub use tracker::{SubmitError, ValidationTracker};
pub use wire::{Envelope, LinkRequest, NodeInfo, SubmitRelay, Transaction};
pub use worker::Worker;
