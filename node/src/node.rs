//! Validator node lifecycle: bind, resume, serve, work, stop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use linkid_crypto::SigningIdentity;
use linkid_ledger::LedgerClient;
use linkid_store::{ProcessStep, ValidationRecord, ValidationStore};
use linkid_types::{Ballot, Clock, PrivateKey, SystemClock};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::context::NodeContext;
use crate::queue::{Job, JobKind};
use crate::router::router;
use crate::shutdown::ShutdownController;
use crate::worker::spawn_worker;
use crate::NodeError;

/// Maximum time to wait for background tasks to finish during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ValidatorNode {
    config: NodeConfig,
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn ValidationStore>,
    clock: Arc<dyn Clock>,
    shutdown: ShutdownController,
    context: Option<Arc<NodeContext>>,
    local_addr: Option<SocketAddr>,
    task_handles: Vec<JoinHandle<()>>,
}

impl ValidatorNode {
    pub fn new(
        config: NodeConfig,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn ValidationStore>,
    ) -> Self {
        Self::with_clock(config, ledger, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: NodeConfig,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn ValidationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            ledger,
            store,
            clock,
            shutdown: ShutdownController::new(),
            context: None,
            local_addr: None,
            task_handles: Vec::new(),
        }
    }

    /// Validate the configuration, bind the listener, reload unfinished
    /// work and spawn the server and the worker. Bind failures are fatal.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        self.config.validate()?;
        let signer = signer_from(&self.config.validator_key)?;
        if signer.address() != self.ledger.sender() {
            return Err(NodeError::Config(format!(
                "validator key controls {} but the ledger client sends as {}",
                signer.address(),
                self.ledger.sender()
            )));
        }
        match self.ledger.identifier_kind().await {
            Ok(kind) if kind != self.config.identifier_kind => {
                return Err(NodeError::Config(format!(
                    "ledger links {kind} identifiers, node is configured for {}",
                    self.config.identifier_kind
                )));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "ledger unreachable at start, continuing"),
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| NodeError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;
        let local_addr = listener.local_addr()?;
        let endpoint = self.config.advertised_endpoint(local_addr.port());

        let ctx = NodeContext::new(
            self.config.clone(),
            signer,
            Arc::clone(&self.ledger),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            endpoint,
        );
        resume_unfinished(&ctx).await?;

        let app = router(Arc::clone(&ctx));
        let mut shutdown_rx = self.shutdown.subscribe();
        let server_handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
            }
        });
        self.task_handles.push(server_handle);

        let worker_handle = spawn_worker(Arc::clone(&ctx), self.shutdown.subscribe());
        self.task_handles.push(worker_handle);

        tracing::info!(
            addr = %local_addr,
            node = %ctx.info.node_id,
            endpoint = %ctx.info.endpoint,
            kind = %ctx.kind(),
            mode = ?ctx.mode(),
            "validator node started"
        );
        self.local_addr = Some(local_addr);
        self.context = Some(ctx);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("validator node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all)
            .await
            .is_err()
        {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }
        tracing::info!("validator node stopped");
        Ok(())
    }

    /// Handle for stopping the node from a signal listener.
    pub fn shutdown_controller(&self) -> ShutdownController {
        self.shutdown.clone()
    }

    pub fn context(&self) -> Option<Arc<NodeContext>> {
        self.context.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NodeError> {
        self.local_addr.ok_or(NodeError::NotStarted)
    }
}

fn signer_from(key: &str) -> Result<SigningIdentity, NodeError> {
    let private =
        PrivateKey::parse(key).map_err(|e| NodeError::Config(format!("validator_key: {e}")))?;
    Ok(SigningIdentity::from_private(&private)?)
}

/// The job that picks up where `record` left off.
pub fn resume_job(record: &ValidationRecord) -> Option<JobKind> {
    let id = record.request_id;
    match record.step {
        ProcessStep::ReceivedRegister => Some(JobKind::Register { id }),
        ProcessStep::ReceivedBroadcast => Some(JobKind::Broadcast { id }),
        ProcessStep::ReceivedCode => Some(JobKind::Vote {
            id,
            ballot: Ballot::Agreement,
        }),
        _ => None,
    }
}

async fn resume_unfinished(ctx: &Arc<NodeContext>) -> Result<(), NodeError> {
    let mut queue = ctx.queue.lock().await;
    let mut tracker = ctx.tracker.lock().await;
    let records = tracker.load_unfinished()?;
    let mut resumed = 0;
    for record in &records {
        if let Some(kind) = resume_job(record) {
            queue.requeue(Job::new(kind));
            resumed += 1;
        }
    }
    if !records.is_empty() {
        tracing::info!(tracked = records.len(), resumed, "resumed unfinished validations");
    }
    ctx.metrics.queue_depth.set(queue.len() as i64);
    ctx.metrics.tracked_validations.set(tracker.len() as i64);
    Ok(())
}
