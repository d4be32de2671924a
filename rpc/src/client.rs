//! HTTP client for a remote ledger service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use linkid_crypto::SigningIdentity;
use linkid_ledger::{
    ClientError, LedgerClient, LedgerError, RequestRecord, RequestState, ValidatorEntry,
};
use linkid_types::{Address, Ballot, IdentifierHash, IdentifierKind, RequestId, Signature};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::auth::{endpoint_payload, vote_payload, CallAuth, ENDPOINT_METHOD, VOTE_METHOD};
use crate::handlers::{
    AddRequestBody, AddressLinkResponse, Empty, EndpointBody, IdentifierLinkResponse,
    InfoResponse, NonceResponse, RequestResponse, UpdateLinkBody, VoteBody, VoteResponse,
};

/// Default timeout for ledger calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct RejectionBody {
    error: LedgerError,
}

/// A [`LedgerClient`] backed by a [`crate::LedgerServer`] over HTTP.
pub struct RemoteLedger {
    base_url: String,
    http_client: reqwest::Client,
    identity: SigningIdentity,
    sequence: AtomicU64,
}

impl RemoteLedger {
    pub fn new(base_url: &str, identity: SigningIdentity) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        // Seeded from wall-clock micros so sequences keep increasing across
        // restarts of the same validator.
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            identity,
            sequence: AtomicU64::new(seed),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, method: &str, payload: &[u8; 32]) -> Result<CallAuth, ClientError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        CallAuth::sign(&self.identity, method, payload, sequence)
            .map_err(|e| ClientError::Transport(format!("failed to sign call: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .http_client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .http_client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }
}

fn transport(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Transport(format!("request timed out: {e}"))
    } else if e.is_connect() {
        ClientError::Transport(format!("connection failed: {e}"))
    } else {
        ClientError::Transport(e.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status == StatusCode::CONFLICT {
        let body: RejectionBody = response
            .json()
            .await
            .map_err(|e| ClientError::Transport(format!("invalid rejection body: {e}")))?;
        return Err(ClientError::Rejected(body.error));
    }
    if !status.is_success() {
        return Err(ClientError::Transport(format!("HTTP status {status}")));
    }
    response
        .json()
        .await
        .map_err(|e| ClientError::Transport(format!("invalid response: {e}")))
}

#[async_trait]
impl LedgerClient for RemoteLedger {
    fn sender(&self) -> Address {
        self.identity.address()
    }

    async fn identifier_kind(&self) -> Result<IdentifierKind, ClientError> {
        let info: InfoResponse = self.get("/info").await?;
        Ok(info.identifier_kind)
    }

    async fn validators(&self) -> Result<Vec<ValidatorEntry>, ClientError> {
        self.get("/validators").await
    }

    async fn validator(&self, index: u32) -> Result<ValidatorEntry, ClientError> {
        self.get(&format!("/validators/{index}")).await
    }

    async fn validator_len(&self) -> Result<usize, ClientError> {
        let info: InfoResponse = self.get("/info").await?;
        Ok(info.validators)
    }

    async fn nonce_of(&self, address: &Address) -> Result<u64, ClientError> {
        let body: NonceResponse = self.get(&format!("/nonce/{address}")).await?;
        Ok(body.nonce)
    }

    async fn to_address(&self, hash: &IdentifierHash) -> Result<Option<Address>, ClientError> {
        let body: AddressLinkResponse = self.get(&format!("/links/identifier/{hash}")).await?;
        Ok(body.address)
    }

    async fn to_identifier(
        &self,
        address: &Address,
    ) -> Result<Option<IdentifierHash>, ClientError> {
        let body: IdentifierLinkResponse = self.get(&format!("/links/address/{address}")).await?;
        Ok(body.identifier_hash)
    }

    async fn is_available(&self, id: &RequestId) -> Result<bool, ClientError> {
        let body: RequestResponse = self.get(&format!("/requests/{id}")).await?;
        Ok(body.available)
    }

    async fn request(&self, id: &RequestId) -> Result<Option<RequestRecord>, ClientError> {
        let body: RequestResponse = self.get(&format!("/requests/{id}")).await?;
        Ok(body.record)
    }

    async fn add_request(
        &self,
        id: RequestId,
        hash: IdentifierHash,
        address: Address,
        signature: Signature,
    ) -> Result<(), ClientError> {
        let body = AddRequestBody {
            id,
            identifier_hash: hash,
            address,
            signature,
        };
        let _: Empty = self.post("/requests", &body).await?;
        Ok(())
    }

    async fn vote_request(
        &self,
        id: RequestId,
        ballot: Ballot,
    ) -> Result<RequestState, ClientError> {
        let auth = self.authorize(VOTE_METHOD, &vote_payload(&id, ballot))?;
        let body = VoteBody { id, ballot, auth };
        let response: VoteResponse = self.post("/votes", &body).await?;
        Ok(response.state)
    }

    async fn update(
        &self,
        hash: IdentifierHash,
        old_address: Address,
        old_signature: Signature,
        new_address: Address,
        new_signature: Signature,
    ) -> Result<(), ClientError> {
        let body = UpdateLinkBody {
            identifier_hash: hash,
            old_address,
            old_signature,
            new_address,
            new_signature,
        };
        let _: Empty = self.post("/links/update", &body).await?;
        Ok(())
    }

    async fn update_endpoint(&self, endpoint: &str) -> Result<(), ClientError> {
        let auth = self.authorize(ENDPOINT_METHOD, &endpoint_payload(endpoint))?;
        let body = EndpointBody {
            endpoint: endpoint.to_string(),
            auth,
        };
        let _: Empty = self.post("/endpoint", &body).await?;
        Ok(())
    }
}
