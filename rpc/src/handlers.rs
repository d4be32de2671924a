//! Request and response bodies plus the axum handlers behind them.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use linkid_ledger::{LedgerError, LedgerEvent, RequestRecord, RequestState, ValidatorEntry};
use linkid_types::{Address, Ballot, IdentifierHash, IdentifierKind, RequestId, Signature};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{endpoint_payload, vote_payload, CallAuth, ENDPOINT_METHOD, VOTE_METHOD};
use crate::error::RpcError;
use crate::server::ServiceState;

// ── Bodies ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct InfoResponse {
    pub identifier_kind: IdentifierKind,
    pub validators: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddressLinkResponse {
    pub address: Option<Address>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentifierLinkResponse {
    pub identifier_hash: Option<IdentifierHash>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestResponse {
    pub available: bool,
    pub record: Option<RequestRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddRequestBody {
    pub id: RequestId,
    pub identifier_hash: IdentifierHash,
    pub address: Address,
    pub signature: Signature,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteBody {
    pub id: RequestId,
    pub ballot: Ballot,
    pub auth: CallAuth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoteResponse {
    pub state: RequestState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateLinkBody {
    pub identifier_hash: IdentifierHash,
    pub old_address: Address,
    pub old_signature: Signature,
    pub new_address: Address,
    pub new_signature: Signature,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndpointBody {
    pub endpoint: String,
    pub auth: CallAuth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Empty {}

type Shared = State<Arc<ServiceState>>;

fn parse<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, RpcError> {
    raw.parse()
        .map_err(|_| RpcError::InvalidRequest(format!("malformed {what}: {raw}")))
}

async fn authorize(
    state: &ServiceState,
    auth: &CallAuth,
    method: &str,
    payload: &[u8; 32],
) -> Result<(), RpcError> {
    if !auth.verify(method, payload) {
        warn!(sender = %auth.sender, method, "call signature mismatch");
        return Err(RpcError::Unauthorized("call signature mismatch".into()));
    }
    // Only validators get a sequence slot.
    if !state.ledger.with(|c| c.is_validator(&auth.sender)).await {
        warn!(sender = %auth.sender, method, "call from non-validator");
        return Err(RpcError::Rejected(LedgerError::NotValidator));
    }
    if !state.sequences.lock().await.advance(&auth.sender, auth.sequence) {
        warn!(sender = %auth.sender, method, sequence = auth.sequence, "replayed call");
        return Err(RpcError::Unauthorized("stale call sequence".into()));
    }
    Ok(())
}

// ── Reads ────────────────────────────────────────────────────────────────

pub async fn info(State(state): Shared) -> Json<InfoResponse> {
    let (identifier_kind, validators) = state
        .ledger
        .with(|c| (c.identifier_kind(), c.validator_len()))
        .await;
    Json(InfoResponse {
        identifier_kind,
        validators,
    })
}

pub async fn validators(State(state): Shared) -> Json<Vec<ValidatorEntry>> {
    Json(state.ledger.with(|c| c.validators().to_vec()).await)
}

pub async fn validator(
    State(state): Shared,
    Path(index): Path<u32>,
) -> Result<Json<ValidatorEntry>, RpcError> {
    let entry = state.ledger.with(|c| c.validator(index).cloned()).await?;
    Ok(Json(entry))
}

pub async fn nonce(
    State(state): Shared,
    Path(address): Path<String>,
) -> Result<Json<NonceResponse>, RpcError> {
    let address: Address = parse(&address, "address")?;
    let nonce = state.ledger.with(|c| c.nonce_of(&address)).await;
    Ok(Json(NonceResponse { nonce }))
}

pub async fn link_by_identifier(
    State(state): Shared,
    Path(hash): Path<String>,
) -> Result<Json<AddressLinkResponse>, RpcError> {
    let hash: IdentifierHash = parse(&hash, "identifier hash")?;
    let address = state.ledger.with(|c| c.to_address(&hash)).await;
    Ok(Json(AddressLinkResponse { address }))
}

pub async fn link_by_address(
    State(state): Shared,
    Path(address): Path<String>,
) -> Result<Json<IdentifierLinkResponse>, RpcError> {
    let address: Address = parse(&address, "address")?;
    let identifier_hash = state.ledger.with(|c| c.to_identifier(&address)).await;
    Ok(Json(IdentifierLinkResponse { identifier_hash }))
}

pub async fn request(
    State(state): Shared,
    Path(id): Path<String>,
) -> Result<Json<RequestResponse>, RpcError> {
    let id: RequestId = parse(&id, "request id")?;
    let record = state.ledger.with(|c| c.request(&id).cloned()).await;
    Ok(Json(RequestResponse {
        available: record.is_none(),
        record,
    }))
}

pub async fn events(State(state): Shared) -> Json<Vec<LedgerEvent>> {
    Json(state.ledger.with(|c| c.events().to_vec()).await)
}

// ── Writes ───────────────────────────────────────────────────────────────

pub async fn add_request(
    State(state): Shared,
    Json(body): Json<AddRequestBody>,
) -> Result<Json<Empty>, RpcError> {
    state
        .ledger
        .with(|c| c.add_request(body.id, body.identifier_hash, body.address, body.signature))
        .await?;
    debug!(request_id = %body.id, "request added over rpc");
    Ok(Json(Empty {}))
}

pub async fn vote(
    State(state): Shared,
    Json(body): Json<VoteBody>,
) -> Result<Json<VoteResponse>, RpcError> {
    authorize(&state, &body.auth, VOTE_METHOD, &vote_payload(&body.id, body.ballot)).await?;
    let sender = body.auth.sender;
    let state_after = state
        .ledger
        .with(|c| c.vote_request(&sender, &body.id, body.ballot))
        .await?;
    Ok(Json(VoteResponse { state: state_after }))
}

pub async fn update_link(
    State(state): Shared,
    Json(body): Json<UpdateLinkBody>,
) -> Result<Json<Empty>, RpcError> {
    state
        .ledger
        .with(|c| {
            c.update(
                body.identifier_hash,
                body.old_address,
                body.old_signature,
                body.new_address,
                body.new_signature,
            )
        })
        .await?;
    Ok(Json(Empty {}))
}

pub async fn update_endpoint(
    State(state): Shared,
    Json(body): Json<EndpointBody>,
) -> Result<Json<Empty>, RpcError> {
    authorize(&state, &body.auth, ENDPOINT_METHOD, &endpoint_payload(&body.endpoint)).await?;
    let sender = body.auth.sender;
    state
        .ledger
        .with(|c| c.update_endpoint(&sender, &body.endpoint))
        .await?;
    Ok(Json(Empty {}))
}
