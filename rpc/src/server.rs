//! Axum-based ledger service.

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use linkid_ledger::{LinkCollection, LocalLedger};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

use crate::auth::SequenceGuard;
use crate::config::LedgerServiceConfig;
use crate::error::RpcError;
use crate::handlers;

pub struct ServiceState {
    pub(crate) ledger: LocalLedger,
    pub(crate) sequences: Mutex<SequenceGuard>,
}

/// Serves one link collection to every validator node.
pub struct LedgerServer {
    config: LedgerServiceConfig,
    ledger: LocalLedger,
}

impl LedgerServer {
    pub fn new(config: LedgerServiceConfig) -> Self {
        let collection = LinkCollection::new(config.identifier_kind, &config.validators);
        Self::with_ledger(config, LocalLedger::new(collection))
    }

    pub fn with_ledger(config: LedgerServiceConfig, ledger: LocalLedger) -> Self {
        Self { config, ledger }
    }

    pub fn ledger(&self) -> &LocalLedger {
        &self.ledger
    }

    pub fn router(&self) -> Router {
        let state = Arc::new(ServiceState {
            ledger: self.ledger.clone(),
            sequences: Mutex::new(SequenceGuard::default()),
        });
        Router::new()
            .route("/info", get(handlers::info))
            .route("/validators", get(handlers::validators))
            .route("/validators/:index", get(handlers::validator))
            .route("/nonce/:address", get(handlers::nonce))
            .route("/links/identifier/:hash", get(handlers::link_by_identifier))
            .route("/links/address/:address", get(handlers::link_by_address))
            .route("/requests/:id", get(handlers::request))
            .route("/events", get(handlers::events))
            .route("/requests", post(handlers::add_request))
            .route("/votes", post(handlers::vote))
            .route("/links/update", post(handlers::update_link))
            .route("/endpoint", post(handlers::update_endpoint))
            .with_state(state)
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RpcError::Server(format!("failed to bind {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RpcError> {
        let app = self.router();
        let local = listener
            .local_addr()
            .map_err(|e| RpcError::Server(e.to_string()))?;
        info!(
            addr = %local,
            validators = self.config.validators.len(),
            kind = %self.config.identifier_kind,
            "ledger service listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))
    }
}
