//! The worker loop: one job per tick plus periodic peer and expiry upkeep.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use linkid_ledger::{ClientError, LedgerError};
use linkid_store::{ProcessStep, ValidationRecord};
use linkid_types::{Ballot, RequestId, Timestamp};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::context::NodeContext;
use crate::peers::{PeerStatus, CheckOutcome, RefreshSummary};
use crate::queue::{Job, JobKind};
use crate::wire::Transaction;

enum JobFailure {
    /// Worth another attempt: the ledger or a peer could not be reached.
    Transient(String),
    Final(String),
}

impl From<ClientError> for JobFailure {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Transport(reason) => JobFailure::Transient(reason),
            ClientError::Rejected(err) => JobFailure::Final(err.to_string()),
        }
    }
}

impl JobFailure {
    fn reason(&self) -> &str {
        match self {
            JobFailure::Transient(r) | JobFailure::Final(r) => r,
        }
    }
}

pub struct Worker {
    ctx: Arc<NodeContext>,
    started: Timestamp,
    initialized: bool,
    endpoint_published: bool,
    last_period: u64,
}

impl Worker {
    pub fn new(ctx: Arc<NodeContext>) -> Self {
        let started = ctx.clock.now();
        Self {
            ctx,
            started,
            initialized: false,
            endpoint_published: false,
            last_period: 0,
        }
    }

    pub async fn tick(&mut self) {
        let now = self.ctx.clock.now();
        if self.started.elapsed_since(now) < self.ctx.config.init_wait_secs {
            return;
        }

        let period = now.as_secs() / self.ctx.config.resync_interval_secs;
        if !self.initialized || period != self.last_period {
            if !self.initialized {
                info!(node = %self.ctx.info.node_id, endpoint = %self.ctx.info.endpoint, "worker initialized");
            }
            self.initialized = true;
            self.last_period = period;
            if !self.endpoint_published {
                self.publish_endpoint().await;
            }
            self.resync().await;
        }

        self.process_next().await;
    }

    async fn publish_endpoint(&mut self) {
        match self.ctx.ledger.update_endpoint(&self.ctx.info.endpoint).await {
            Ok(()) => {
                self.endpoint_published = true;
                info!(endpoint = %self.ctx.info.endpoint, "endpoint published");
            }
            Err(e) => {
                warn!(method = "updateEndpoint", error = %e, "failed to publish endpoint");
            }
        }
    }

    /// Peer refresh, health check, expiry sweep and purge.
    pub async fn resync(&self) {
        self.refresh_peers().await;
        self.health_check().await;
        self.sweep().await;
    }

    pub async fn refresh_peers(&self) {
        match self.ctx.ledger.validators().await {
            Ok(entries) => {
                let summary = self.ctx.peers.write().await.apply_registry(&entries);
                if summary != RefreshSummary::default() {
                    info!(
                        added = summary.added,
                        removed = summary.removed,
                        updated = summary.updated,
                        "peer directory refreshed"
                    );
                }
            }
            Err(e) => warn!(method = "getValidators", error = %e, "failed to refresh peers"),
        }
    }

    pub async fn health_check(&self) {
        let targets = self.ctx.peers.read().await.check_targets();
        let checks = targets.into_iter().map(|peer| {
            let client = self.ctx.peer_client.clone();
            async move {
                let outcome = match client.info(&peer.endpoint).await {
                    Ok(info) => CheckOutcome::Answered(info),
                    Err(e) => {
                        debug!(peer = %peer.node_id, error = %e, "health check failed");
                        CheckOutcome::Unreachable
                    }
                };
                (peer.node_id, outcome)
            }
        });
        let results = join_all(checks).await;

        let mut peers = self.ctx.peers.write().await;
        for (node_id, outcome) in results {
            if peers.record_check(&node_id, outcome) == Some(PeerStatus::Abnormal) {
                warn!(peer = %node_id, "peer answered with another identity, excluded");
            }
        }
        self.ctx.metrics.active_peers.set(peers.active_count() as i64);
    }

    /// Expired codes get an opposition vote; old terminal entries are dropped.
    pub async fn sweep(&self) {
        let mut queue = self.ctx.queue.lock().await;
        let mut tracker = self.ctx.tracker.lock().await;
        for id in tracker.expire_due() {
            info!(request_id = %id, "code expired, voting opposition");
            queue.requeue(Job::new(JobKind::Vote {
                id,
                ballot: Ballot::Opposition,
            }));
        }
        let purged = tracker.purge_finished();
        if purged > 0 {
            debug!(purged, "purged finished validations");
        }
        self.ctx.metrics.queue_depth.set(queue.len() as i64);
        self.ctx
            .metrics
            .tracked_validations
            .set(tracker.len() as i64);
    }

    /// Run the oldest job. Returns `false` when the queue was empty.
    pub async fn process_next(&self) -> bool {
        let job = {
            let mut queue = self.ctx.queue.lock().await;
            let job = queue.pop();
            self.ctx.metrics.queue_depth.set(queue.len() as i64);
            job
        };
        let Some(job) = job else {
            return false;
        };

        let label = job.kind.label();
        let id = job.kind.request_id();
        match self.run(job.kind).await {
            Ok(()) => {
                self.ctx
                    .metrics
                    .jobs_processed
                    .with_label_values(&[label])
                    .inc();
            }
            Err(JobFailure::Transient(reason))
                if job.attempts + 1 < self.ctx.config.max_job_attempts =>
            {
                warn!(job = label, request_id = %id, attempt = job.attempts + 1, %reason, "job failed, retrying");
                let mut queue = self.ctx.queue.lock().await;
                queue.requeue(Job {
                    kind: job.kind,
                    attempts: job.attempts + 1,
                });
                self.ctx.metrics.queue_depth.set(queue.len() as i64);
            }
            Err(failure) => {
                error!(job = label, request_id = %id, reason = failure.reason(), "job abandoned");
                self.ctx.metrics.jobs_failed.with_label_values(&[label]).inc();
                self.ctx
                    .tracker
                    .lock()
                    .await
                    .set_step(&id, ProcessStep::Finished);
            }
        }
        true
    }

    async fn run(&self, kind: JobKind) -> Result<(), JobFailure> {
        match kind {
            JobKind::Register { id } => self.register(id).await,
            JobKind::Broadcast { id } => self.follow_broadcast(id).await,
            JobKind::SendCode { id } => self.send_code(id).await,
            JobKind::Vote { id, ballot } => self.vote(id, ballot).await,
        }
    }

    async fn tracked(&self, id: &RequestId) -> Result<ValidationRecord, JobFailure> {
        self.ctx
            .tracker
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| JobFailure::Final("validation not tracked".into()))
    }

    async fn register(&self, id: RequestId) -> Result<(), JobFailure> {
        let record = self.tracked(&id).await?;
        if let Err(e) = self
            .ctx
            .ledger
            .add_request(
                id,
                record.identifier_hash,
                record.address,
                record.request_signature,
            )
            .await
        {
            // A retried write may already have landed.
            let duplicate = matches!(e, ClientError::Rejected(LedgerError::DuplicateRequest));
            if !(duplicate && self.ledger_agrees(&record).await? == Some(true)) {
                return Err(e.into());
            }
            debug!(request_id = %id, "request already on ledger");
        } else {
            info!(request_id = %id, address = %record.address, "request registered on ledger");
        }

        self.ctx
            .broadcast_transaction(Transaction::from_record(&record))
            .await;
        self.next_step(id).await;
        Ok(())
    }

    /// Compare the ledger's copy of the request with the claim this node
    /// verified. `None` when the ledger has no such request yet.
    async fn ledger_agrees(&self, record: &ValidationRecord) -> Result<Option<bool>, JobFailure> {
        let on_ledger = self.ctx.ledger.request(&record.request_id).await?;
        Ok(on_ledger.map(|r| {
            r.address == record.address && r.identifier_hash == record.identifier_hash
        }))
    }

    async fn follow_broadcast(&self, id: RequestId) -> Result<(), JobFailure> {
        let record = self.tracked(&id).await?;
        match self.ledger_agrees(&record).await? {
            None => Err(JobFailure::Transient("request not on ledger yet".into())),
            Some(false) => {
                warn!(
                    request_id = %id,
                    receiver = %record.receiver,
                    "relayed claim does not match the ledger record"
                );
                Err(JobFailure::Final(
                    "ledger record binds another identifier or address".into(),
                ))
            }
            Some(true) => {
                self.next_step(id).await;
                Ok(())
            }
        }
    }

    async fn next_step(&self, id: RequestId) {
        let next = if self.ctx.mode().requires_code() {
            JobKind::SendCode { id }
        } else {
            JobKind::Vote {
                id,
                ballot: Ballot::Agreement,
            }
        };
        self.ctx.follow_up(next).await;
    }

    async fn send_code(&self, id: RequestId) -> Result<(), JobFailure> {
        self.tracked(&id).await?;
        let index = self
            .ctx
            .self_index()
            .await
            .ok_or_else(|| JobFailure::Transient("validator index unknown".into()))?;
        let code = self.ctx.codes.generate(index);
        let recipient = self.ctx.tracker.lock().await.on_send_code(&id, code.clone());
        let Some(recipient) = recipient else {
            debug!(request_id = %id, "code already issued");
            return Ok(());
        };

        let total = self.ctx.peers.read().await.validator_count();
        if self.ctx.notifier.send(index, total, &code, &recipient).await {
            self.ctx.metrics.codes_sent.inc();
            info!(request_id = %id, "verification code issued");
        } else {
            warn!(request_id = %id, "verification code delivery failed");
        }
        Ok(())
    }

    async fn vote(&self, id: RequestId, ballot: Ballot) -> Result<(), JobFailure> {
        let step = match self.ctx.ledger.vote_request(id, ballot).await {
            Ok(state) => {
                self.ctx.metrics.votes_cast.inc();
                info!(request_id = %id, ?ballot, ?state, "vote recorded");
                if state.is_final() {
                    ProcessStep::Finished
                } else {
                    ProcessStep::Voted
                }
            }
            Err(ClientError::Rejected(
                e @ (LedgerError::AlreadyVoted | LedgerError::UnknownRequest),
            )) => {
                debug!(request_id = %id, reason = %e, "vote no longer needed");
                ProcessStep::Finished
            }
            Err(e) => return Err(e.into()),
        };
        self.ctx.tracker.lock().await.set_step(&id, step);
        Ok(())
    }
}

/// Drive `worker` every `tick_interval_ms` until shutdown.
pub fn spawn_worker(
    ctx: Arc<NodeContext>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let period = Duration::from_millis(ctx.config.tick_interval_ms);
    let mut worker = Worker::new(ctx);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("worker shutting down");
                    break;
                }
                _ = interval.tick() => {
                    worker.tick().await;
                }
            }
        }
    })
}
