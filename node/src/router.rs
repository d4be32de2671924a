//! HTTP surface of a validator node.
//!
//! Business outcomes travel as HTTP 200 with an [`Envelope`] code.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use linkid_crypto::{identifier_hash, request_id, verify_request};
use linkid_ledger::LedgerClient;
use linkid_store::ProcessStep;
use linkid_types::{Address, Ballot, RequestId, Signature};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::context::NodeContext;
use crate::queue::JobKind;
use crate::wire::{codes, Envelope, FieldError, LinkRequest, SubmitRelay, Transaction};

/// Attempts at drawing an unused request id before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

type Shared = State<Arc<NodeContext>>;

pub fn router(ctx: Arc<NodeContext>) -> Router {
    let mut router = Router::new()
        .route("/info", get(info))
        .route("/peers", get(peers))
        .route("/request", post(request))
        .route("/broadcast", post(broadcast))
        .route("/submit", post(submit))
        .route("/broadcastSubmit", post(broadcast_submit));
    if ctx.config.enable_metrics {
        router = router.route("/metrics", get(metrics));
    }
    router.layer(CorsLayer::permissive()).with_state(ctx)
}

// ── Bodies ───────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RequestBody {
    #[serde(alias = "email", alias = "phone")]
    pub identifier: String,
    pub address: String,
    pub signature: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubmitBody {
    pub request_id: String,
    pub code: String,
}

fn malformed(rejection: JsonRejection) -> Envelope {
    Envelope::invalid(vec![FieldError::new("body", &rejection.body_text())])
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn info(State(ctx): Shared) -> Envelope {
    Envelope::ok(&ctx.info)
}

async fn peers(State(ctx): Shared) -> Envelope {
    Envelope::ok(ctx.peers.read().await.list())
}

async fn metrics(State(ctx): Shared) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        ctx.metrics.encode(),
    )
        .into_response()
}

async fn request(
    State(ctx): Shared,
    body: Result<Json<RequestBody>, JsonRejection>,
) -> Envelope {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed(rejection),
    };
    let kind = ctx.kind();

    let mut fields = Vec::new();
    if !kind.is_well_formed(&body.identifier) {
        fields.push(FieldError::new(kind.as_str(), "Invalid value"));
    }
    if !Address::is_well_formed(&body.address) {
        fields.push(FieldError::new("address", "Invalid value"));
    }
    if !Signature::is_well_formed(&body.signature) {
        fields.push(FieldError::new("signature", "Invalid value"));
    }
    let (Ok(address), Ok(signature)) = (
        Address::parse(&body.address),
        Signature::parse(&body.signature),
    ) else {
        return Envelope::invalid(fields);
    };
    if !fields.is_empty() {
        return Envelope::invalid(fields);
    }
    if !ctx.queue.lock().await.has_room() {
        return Envelope::error(codes::BUSY, "Validator is busy");
    }

    let identifier = kind.normalize(&body.identifier);
    let hash = identifier_hash(kind, &identifier);
    let ledger = &ctx.ledger;

    let nonce = match ledger.nonce_of(&address).await {
        Ok(nonce) => nonce,
        Err(e) => return ledger_failure("nonceOf", e),
    };
    if !verify_request(&address, &hash, nonce, &signature) {
        return Envelope::error(codes::INVALID_SIGNATURE, "The signature value entered is not valid");
    }
    match ledger.to_address(&hash).await {
        Ok(Some(_)) => {
            return Envelope::error(codes::IDENTIFIER_TAKEN, "The identifier is already registered")
        }
        Ok(None) => {}
        Err(e) => return ledger_failure("toAddress", e),
    }
    match ledger.to_identifier(&address).await {
        Ok(Some(_)) => {
            return Envelope::error(codes::ADDRESS_TAKEN, "The address is already registered")
        }
        Ok(None) => {}
        Err(e) => return ledger_failure("toIdentifier", e),
    }
    let id = match unused_request_id(ledger.as_ref(), &hash, &address, nonce).await {
        Ok(Some(id)) => id,
        Ok(None) => return Envelope::error(codes::INTERNAL, "Could not allocate a request id"),
        Err(e) => return ledger_failure("isAvailable", e),
    };

    let link = LinkRequest {
        identifier,
        address,
        nonce,
        signature,
    };
    let tx = match Transaction::sign(link, id, &ctx.signer, kind) {
        Ok(tx) => tx,
        Err(e) => return Envelope::error(codes::INTERNAL, e.to_string()),
    };

    {
        let mut queue = ctx.queue.lock().await;
        if !queue.has_room() {
            return Envelope::error(codes::BUSY, "Validator is busy");
        }
        ctx.tracker
            .lock()
            .await
            .insert(tx.to_record(kind, ProcessStep::ReceivedRegister));
        if queue.push(JobKind::Register { id }).is_err() {
            return Envelope::error(codes::BUSY, "Validator is busy");
        }
        ctx.metrics.queue_depth.set(queue.len() as i64);
    }
    ctx.metrics.requests_received.inc();
    info!(request_id = %id, %address, "link request received");
    Envelope::ok(json!({ "requestId": id }))
}

async fn unused_request_id(
    ledger: &dyn LedgerClient,
    hash: &linkid_types::IdentifierHash,
    address: &Address,
    nonce: u64,
) -> Result<Option<RequestId>, linkid_ledger::ClientError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let id = request_id(hash, address, nonce);
        if ledger.is_available(&id).await? {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

fn ledger_failure(method: &str, e: linkid_ledger::ClientError) -> Envelope {
    warn!(method, error = %e, "ledger read failed");
    Envelope::error(codes::LEDGER_FAILURE, format!("Ledger call {method} failed"))
}

async fn broadcast(
    State(ctx): Shared,
    body: Result<Json<Transaction>, JsonRejection>,
) -> Envelope {
    let Json(tx) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed(rejection),
    };
    let kind = ctx.kind();
    if !kind.is_well_formed(&tx.request.identifier) {
        return Envelope::invalid(vec![FieldError::new(kind.as_str(), "Invalid value")]);
    }
    if !tx.verify_receiver(kind) {
        return Envelope::error(codes::INVALID_SIGNATURE, "The relay signature is not valid");
    }
    if !ctx.peers.read().await.is_validator(&tx.receiver) {
        return Envelope::error(codes::NOT_VALIDATOR, "The sender is not a validator");
    }
    if !tx.request.verify(kind) {
        return Envelope::error(codes::INVALID_SIGNATURE, "The signature value entered is not valid");
    }

    let id = tx.request_id;
    // The relayer may run ahead of the ledger; the worker checks again.
    match ctx.ledger.request(&id).await {
        Ok(Some(on_ledger))
            if on_ledger.address != tx.request.address
                || on_ledger.identifier_hash != tx.request.identifier_hash(kind) =>
        {
            warn!(request_id = %id, receiver = %tx.receiver, "relayed claim does not match the ledger");
            return Envelope::error(
                codes::REQUEST_MISMATCH,
                "The request does not match the ledger record",
            );
        }
        Ok(_) => {}
        Err(e) => debug!(request_id = %id, error = %e, "ledger lookup skipped"),
    }

    let mut queue = ctx.queue.lock().await;
    let mut tracker = ctx.tracker.lock().await;
    if tracker.contains(&id) {
        debug!(request_id = %id, "broadcast already tracked");
        return Envelope::ok(json!({}));
    }
    if !queue.has_room() {
        return Envelope::error(codes::BUSY, "Validator is busy");
    }
    tracker.insert(tx.to_record(kind, ProcessStep::ReceivedBroadcast));
    if queue.push(JobKind::Broadcast { id }).is_err() {
        return Envelope::error(codes::BUSY, "Validator is busy");
    }
    ctx.metrics.queue_depth.set(queue.len() as i64);
    ctx.metrics.broadcasts_received.inc();
    info!(request_id = %id, receiver = %tx.receiver, "broadcast received");
    Envelope::ok(json!({}))
}

async fn submit(
    State(ctx): Shared,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Envelope {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed(rejection),
    };
    let mut fields = Vec::new();
    let id = RequestId::parse(&body.request_id);
    if id.is_err() {
        fields.push(FieldError::new("requestId", "Invalid value"));
    }
    if body.code.trim().is_empty() {
        fields.push(FieldError::new("code", "Invalid value"));
    }
    let Ok(id) = id else {
        return Envelope::invalid(fields);
    };
    if !fields.is_empty() {
        return Envelope::invalid(fields);
    }
    let code = body.code.trim().to_string();

    let reply = accept_code(&ctx, id, &code).await;
    if reply.is_ok() {
        match SubmitRelay::sign(id, code, &ctx.signer) {
            Ok(relay) => ctx.broadcast_submit(relay).await,
            Err(e) => warn!(request_id = %id, error = %e, "failed to sign submit relay"),
        }
    }
    reply
}

async fn broadcast_submit(
    State(ctx): Shared,
    body: Result<Json<SubmitRelay>, JsonRejection>,
) -> Envelope {
    let Json(relay) = match body {
        Ok(body) => body,
        Err(rejection) => return malformed(rejection),
    };
    if !relay.verify() {
        return Envelope::error(codes::INVALID_SIGNATURE, "The relay signature is not valid");
    }
    if !ctx.peers.read().await.is_validator(&relay.receiver) {
        return Envelope::error(codes::NOT_VALIDATOR, "The sender is not a validator");
    }
    accept_code(&ctx, relay.request_id, relay.code.trim()).await
}

/// Check `code` against this validator's slice and queue the agreement vote.
async fn accept_code(ctx: &Arc<NodeContext>, id: RequestId, code: &str) -> Envelope {
    let Some(index) = ctx.self_index().await else {
        return Envelope::error(codes::INTERNAL, "Validator index is not known yet");
    };
    let mut queue = ctx.queue.lock().await;
    if !queue.has_room() {
        return Envelope::error(codes::BUSY, "Validator is busy");
    }
    if let Err(e) = ctx.tracker.lock().await.on_submit_code(&id, code, index) {
        debug!(request_id = %id, error = %e, "code refused");
        return Envelope::error(e.code(), e.to_string());
    }
    if queue
        .push(JobKind::Vote {
            id,
            ballot: Ballot::Agreement,
        })
        .is_err()
    {
        return Envelope::error(codes::BUSY, "Validator is busy");
    }
    ctx.metrics.queue_depth.set(queue.len() as i64);
    ctx.metrics.submits_received.inc();
    info!(request_id = %id, "code confirmed");
    Envelope::ok("OK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthenticationMode, NodeConfig};
    use crate::testing::{fixture, fixture_with, identity, signed_request, Fixture};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use linkid_store::ValidationStatus;
    use linkid_types::IdentifierKind;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(ctx: &Arc<NodeContext>, method: &str, path: &str, body: Option<Value>) -> Envelope {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = router(ctx.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request_body(nonce: u64) -> Value {
        let request = signed_request(&identity(0x11), nonce);
        json!({
            "email": request.identifier,
            "address": request.address.to_string(),
            "signature": request.signature.to_string(),
        })
    }

    /// A request for the user's claim relayed by `receiver`.
    fn relayed(receiver: u8) -> Transaction {
        Transaction::sign(
            signed_request(&identity(0x11), 0),
            RequestId::new([5; 32]),
            &identity(receiver),
            IdentifierKind::Email,
        )
        .unwrap()
    }

    async fn sent_code(f: &Fixture, code: &str) -> RequestId {
        let tx = relayed(0x22);
        let mut tracker = f.ctx.tracker.lock().await;
        tracker.insert(tx.to_record(IdentifierKind::Email, ProcessStep::ReceivedBroadcast));
        tracker.on_send_code(&tx.request_id, code.to_string());
        tx.request_id
    }

    #[tokio::test]
    async fn info_reports_identity() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        let reply = call(&f.ctx, "GET", "/info", None).await;
        assert!(reply.is_ok());
        let data = reply.data.unwrap();
        assert_eq!(data["nodeId"], identity(0x21).address().to_string());
        assert_eq!(data["endpoint"], "http://127.0.0.1:1");
    }

    #[tokio::test]
    async fn peers_lists_other_validators() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        f.refresh_peers().await;
        let reply = call(&f.ctx, "GET", "/peers", None).await;
        let peers = reply.data.unwrap();
        assert_eq!(peers.as_array().unwrap().len(), 1);
        assert_eq!(peers[0]["nodeId"], f.other.address().to_string());
        assert_eq!(peers[0]["status"], "UNKNOWN");
    }

    #[tokio::test]
    async fn request_queues_registration() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        let reply = call(&f.ctx, "POST", "/request", Some(request_body(0))).await;
        assert!(reply.is_ok(), "{}", reply.message());
        let id: RequestId =
            serde_json::from_value(reply.data.unwrap()["requestId"].clone()).unwrap();

        let record = f.ctx.tracker.lock().await.get(&id).cloned().unwrap();
        assert_eq!(record.step, ProcessStep::ReceivedRegister);
        assert_eq!(record.receiver, identity(0x21).address());
        assert!(Transaction::from_record(&record).verify_receiver(IdentifierKind::Email));
        assert!(f.ctx.queue.lock().await.contains(&id));
        assert_eq!(f.ctx.metrics.requests_received.get(), 1);
    }

    #[tokio::test]
    async fn request_validation_lists_fields() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        let reply = call(
            &f.ctx,
            "POST",
            "/request",
            Some(json!({"email": "not-an-email", "address": "0x12", "signature": "0x"})),
        )
        .await;
        assert_eq!(reply.code, codes::INVALID_INPUT);
        let params: Vec<String> = reply
            .error
            .unwrap()
            .validation
            .unwrap()
            .into_iter()
            .map(|f| f.param)
            .collect();
        assert_eq!(params, vec!["email", "address", "signature"]);
        assert!(f.ctx.queue.lock().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_invalid_input() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        let reply = call(&f.ctx, "POST", "/submit", None).await;
        assert_eq!(reply.code, codes::INVALID_INPUT);
    }

    #[tokio::test]
    async fn stale_nonce_signature_is_refused() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        let reply = call(&f.ctx, "POST", "/request", Some(request_body(1))).await;
        assert_eq!(reply.code, codes::INVALID_SIGNATURE);
    }

    #[tokio::test]
    async fn linked_identifier_is_refused() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        let owner = identity(0x12);
        let request = signed_request(&owner, 0);
        let hash = request.identifier_hash(IdentifierKind::Email);
        let id = RequestId::new([1; 32]);
        let validators = [identity(0x21).address(), f.other.address()];
        f.ledger
            .with(|c| {
                c.add_request(id, hash, owner.address(), request.signature)?;
                for v in &validators {
                    c.vote_request(v, &id, Ballot::Agreement)?;
                }
                Ok::<_, linkid_ledger::LedgerError>(())
            })
            .await
            .unwrap();

        let reply = call(&f.ctx, "POST", "/request", Some(request_body(0))).await;
        assert_eq!(reply.code, codes::IDENTIFIER_TAKEN);
    }

    #[tokio::test]
    async fn full_queue_answers_busy() {
        let f = fixture_with(NodeConfig {
            identifier_kind: IdentifierKind::Email,
            job_queue_capacity: 1,
            ..NodeConfig::default()
        });
        f.ctx
            .queue
            .lock()
            .await
            .push(JobKind::SendCode {
                id: RequestId::new([9; 32]),
            })
            .unwrap();
        let reply = call(&f.ctx, "POST", "/request", Some(request_body(0))).await;
        assert_eq!(reply.code, codes::BUSY);
        assert!(f.ctx.tracker.lock().await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_checks_relayer() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        f.refresh_peers().await;

        let mut forged = relayed(0x22);
        forged.receiver = identity(0x21).address();
        let reply = call(&f.ctx, "POST", "/broadcast", Some(serde_json::to_value(&forged).unwrap())).await;
        assert_eq!(reply.code, codes::INVALID_SIGNATURE);

        let outsider = relayed(0x33);
        let reply = call(&f.ctx, "POST", "/broadcast", Some(serde_json::to_value(&outsider).unwrap())).await;
        assert_eq!(reply.code, codes::NOT_VALIDATOR);
    }

    #[tokio::test]
    async fn broadcast_refuses_claim_that_disagrees_with_ledger() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        f.refresh_peers().await;
        let other_user = identity(0x12);
        let hash = linkid_crypto::identifier_hash(IdentifierKind::Email, "evil@example.com");
        let signature = linkid_crypto::sign_request(&other_user, &hash, 0).unwrap();
        let id = RequestId::new([5; 32]);
        f.ledger
            .with(|c| c.add_request(id, hash, other_user.address(), signature))
            .await
            .unwrap();

        let tx = serde_json::to_value(relayed(0x22)).unwrap();
        let reply = call(&f.ctx, "POST", "/broadcast", Some(tx)).await;
        assert_eq!(reply.code, codes::REQUEST_MISMATCH);
        assert!(f.ctx.tracker.lock().await.is_empty());
        assert!(f.ctx.queue.lock().await.is_empty());
    }

    #[tokio::test]
    async fn broadcast_is_idempotent() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        f.refresh_peers().await;
        let tx = serde_json::to_value(relayed(0x22)).unwrap();

        assert!(call(&f.ctx, "POST", "/broadcast", Some(tx.clone())).await.is_ok());
        assert!(call(&f.ctx, "POST", "/broadcast", Some(tx)).await.is_ok());
        assert_eq!(f.ctx.queue.lock().await.len(), 1);
        assert_eq!(f.ctx.metrics.broadcasts_received.get(), 1);
    }

    #[tokio::test]
    async fn submit_confirms_own_slice() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        f.refresh_peers().await;
        let id = sent_code(&f, "00").await;

        let wrong = call(&f.ctx, "POST", "/submit", Some(json!({"requestId": id, "code": "0101"}))).await;
        assert_eq!(wrong.code, codes::INVALID_SIGNATURE);

        let reply = call(&f.ctx, "POST", "/submit", Some(json!({"requestId": id, "code": "0001"}))).await;
        assert!(reply.is_ok(), "{}", reply.message());
        assert_eq!(reply.data, Some(json!("OK")));
        assert_eq!(
            f.ctx.tracker.lock().await.get(&id).unwrap().status,
            ValidationStatus::Confirmed
        );
        assert!(f.ctx.queue.lock().await.contains(&id));

        let again = call(&f.ctx, "POST", "/submit", Some(json!({"requestId": id, "code": "0001"}))).await;
        assert_eq!(again.code, codes::ALREADY_CONFIRMED);
    }

    #[tokio::test]
    async fn submit_state_errors() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        f.refresh_peers().await;
        let unknown = RequestId::new([4; 32]);
        let reply = call(&f.ctx, "POST", "/submit", Some(json!({"requestId": unknown, "code": "00"}))).await;
        assert_eq!(reply.code, codes::UNKNOWN_REQUEST);

        let id = sent_code(&f, "00").await;
        f.clock.advance(300);
        let reply = call(&f.ctx, "POST", "/submit", Some(json!({"requestId": id, "code": "00"}))).await;
        assert_eq!(reply.code, codes::CODE_EXPIRED);
        assert!(f.ctx.queue.lock().await.is_empty());
    }

    #[tokio::test]
    async fn relayed_submit_requires_validator_signature() {
        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        f.refresh_peers().await;
        let id = sent_code(&f, "00").await;

        let outsider = SubmitRelay::sign(id, "00".into(), &identity(0x33)).unwrap();
        let reply = call(&f.ctx, "POST", "/broadcastSubmit", Some(serde_json::to_value(&outsider).unwrap())).await;
        assert_eq!(reply.code, codes::NOT_VALIDATOR);

        let relay = SubmitRelay::sign(id, "00".into(), &f.other).unwrap();
        let reply = call(&f.ctx, "POST", "/broadcastSubmit", Some(serde_json::to_value(&relay).unwrap())).await;
        assert!(reply.is_ok(), "{}", reply.message());
    }

    #[tokio::test]
    async fn metrics_route_follows_config() {
        let f = fixture_with(NodeConfig {
            enable_metrics: true,
            ..NodeConfig::default()
        });
        let response = router(f.ctx.clone())
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&text).contains("linkid_requests_received_total"));

        let f = fixture(AuthenticationMode::NoSendKnownCode, 0);
        let response = router(f.ctx.clone())
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
