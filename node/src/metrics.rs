//! Prometheus metrics for a validator node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] that the `/metrics` route
//! encodes into the Prometheus text exposition format.

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Link requests accepted over `/request`.
    pub requests_received: IntCounter,
    /// Transactions relayed to us over `/broadcast`.
    pub broadcasts_received: IntCounter,
    /// Codes received over `/submit` and `/broadcastSubmit`.
    pub submits_received: IntCounter,
    /// Jobs completed, labelled by job kind.
    pub jobs_processed: IntCounterVec,
    /// Jobs given up on, labelled by job kind.
    pub jobs_failed: IntCounterVec,
    pub votes_cast: IntCounter,
    pub codes_sent: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub queue_depth: IntGauge,
    pub active_peers: IntGauge,
    pub tracked_validations: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_received = register_int_counter_with_registry!(
            Opts::new(
                "linkid_requests_received_total",
                "Link requests accepted from users"
            ),
            registry
        )
        .expect("failed to register requests_received counter");

        let broadcasts_received = register_int_counter_with_registry!(
            Opts::new(
                "linkid_broadcasts_received_total",
                "Transactions relayed by other validators"
            ),
            registry
        )
        .expect("failed to register broadcasts_received counter");

        let submits_received = register_int_counter_with_registry!(
            Opts::new(
                "linkid_submits_received_total",
                "Verification codes received"
            ),
            registry
        )
        .expect("failed to register submits_received counter");

        let jobs_processed = register_int_counter_vec_with_registry!(
            Opts::new("linkid_jobs_processed_total", "Jobs completed by the worker"),
            &["kind"],
            registry
        )
        .expect("failed to register jobs_processed counter");

        let jobs_failed = register_int_counter_vec_with_registry!(
            Opts::new("linkid_jobs_failed_total", "Jobs abandoned by the worker"),
            &["kind"],
            registry
        )
        .expect("failed to register jobs_failed counter");

        let votes_cast = register_int_counter_with_registry!(
            Opts::new("linkid_votes_cast_total", "Ballots recorded on the ledger"),
            registry
        )
        .expect("failed to register votes_cast counter");

        let codes_sent = register_int_counter_with_registry!(
            Opts::new("linkid_codes_sent_total", "Verification codes issued"),
            registry
        )
        .expect("failed to register codes_sent counter");

        let queue_depth = register_int_gauge_with_registry!(
            Opts::new("linkid_queue_depth", "Jobs waiting in the queue"),
            registry
        )
        .expect("failed to register queue_depth gauge");

        let active_peers = register_int_gauge_with_registry!(
            Opts::new("linkid_active_peers", "Peers that passed the last health check"),
            registry
        )
        .expect("failed to register active_peers gauge");

        let tracked_validations = register_int_gauge_with_registry!(
            Opts::new(
                "linkid_tracked_validations",
                "Validations held in memory"
            ),
            registry
        )
        .expect("failed to register tracked_validations gauge");

        Self {
            registry,
            requests_received,
            broadcasts_received,
            submits_received,
            jobs_processed,
            jobs_failed,
            votes_cast,
            codes_sent,
            queue_depth,
            active_peers,
            tracked_validations,
        }
    }

    /// Text exposition of every metric in the registry.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
