//! State shared by the HTTP handlers and the worker loop of one node.
//!
//! Lock order is queue, then tracker. No lock is held across a network call.

use std::sync::Arc;

use linkid_crypto::SigningIdentity;
use linkid_ledger::LedgerClient;
use linkid_store::ValidationStore;
use linkid_types::{Clock, IdentifierKind};
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::code::CodeGenerator;
use crate::config::{AuthenticationMode, NodeConfig};
use crate::metrics::NodeMetrics;
use crate::notifier::Notifier;
use crate::peer_client::PeerClient;
use crate::peers::PeerDirectory;
use crate::queue::{Job, JobKind, JobQueue};
use crate::tracker::ValidationTracker;
use crate::wire::{NodeInfo, SubmitRelay, Transaction};

pub struct NodeContext {
    pub info: NodeInfo,
    pub config: NodeConfig,
    pub signer: SigningIdentity,
    pub ledger: Arc<dyn LedgerClient>,
    pub peers: RwLock<PeerDirectory>,
    pub queue: Mutex<JobQueue>,
    pub tracker: Mutex<ValidationTracker>,
    pub notifier: Notifier,
    pub codes: CodeGenerator,
    pub peer_client: PeerClient,
    pub metrics: NodeMetrics,
    pub clock: Arc<dyn Clock>,
}

impl NodeContext {
    /// Assemble a node's shared state; `endpoint` is what peers reach it at.
    pub fn new(
        config: NodeConfig,
        signer: SigningIdentity,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn ValidationStore>,
        clock: Arc<dyn Clock>,
        endpoint: String,
    ) -> Arc<Self> {
        let info = NodeInfo {
            node_id: signer.address(),
            endpoint,
            version: env!("CARGO_PKG_VERSION").to_string(),
        };
        let tracker = ValidationTracker::new(
            store,
            Arc::clone(&clock),
            config.code_ttl_secs,
            config.finished_retention_secs,
        );
        Arc::new(Self {
            info,
            peers: RwLock::new(PeerDirectory::new(signer.address())),
            queue: Mutex::new(JobQueue::new(config.job_queue_capacity)),
            tracker: Mutex::new(tracker),
            notifier: Notifier::from_config(
                config.authentication_mode,
                config.gateway.as_ref(),
                config.code_ttl_secs,
            ),
            codes: CodeGenerator::for_mode(config.authentication_mode),
            peer_client: PeerClient::new(),
            metrics: NodeMetrics::new(),
            config,
            signer,
            ledger,
            clock,
        })
    }

    pub fn kind(&self) -> IdentifierKind {
        self.config.identifier_kind
    }

    pub fn mode(&self) -> AuthenticationMode {
        self.config.authentication_mode
    }

    pub async fn self_index(&self) -> Option<u32> {
        self.peers.read().await.self_index()
    }

    /// Enqueue a follow-up job, bypassing the intake bound.
    pub async fn follow_up(&self, kind: JobKind) {
        let mut queue = self.queue.lock().await;
        queue.requeue(Job::new(kind));
        self.metrics.queue_depth.set(queue.len() as i64);
    }

    /// Relay a registered request to every active peer without waiting.
    pub async fn broadcast_transaction(self: &Arc<Self>, tx: Transaction) {
        let peers = self.peers.read().await.active();
        for peer in peers {
            let ctx = Arc::clone(self);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Err(e) = ctx.peer_client.broadcast(&peer.endpoint, &tx).await {
                    warn!(peer = %peer.node_id, request_id = %tx.request_id, error = %e, "broadcast failed");
                    if e.is_unreachable() {
                        ctx.peers.write().await.mark_unreachable(&peer.node_id);
                    }
                }
            });
        }
    }

    /// Relay a confirmed code to every active peer without waiting.
    pub async fn broadcast_submit(self: &Arc<Self>, relay: SubmitRelay) {
        let peers = self.peers.read().await.active();
        for peer in peers {
            let ctx = Arc::clone(self);
            let relay = relay.clone();
            tokio::spawn(async move {
                if let Err(e) = ctx.peer_client.broadcast_submit(&peer.endpoint, &relay).await {
                    warn!(peer = %peer.node_id, request_id = %relay.request_id, error = %e, "submit relay failed");
                    if e.is_unreachable() {
                        ctx.peers.write().await.mark_unreachable(&peer.node_id);
                    }
                }
            });
        }
    }
}
