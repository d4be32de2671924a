//! HTTP client for validator-to-validator calls.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::wire::{Envelope, NodeInfo, SubmitRelay, Transaction};

/// Peer calls are short: a slow peer is marked inactive and retried on the
/// next health check.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer unreachable: {0}")]
    Transport(String),

    #[error("peer answered HTTP {0}")]
    Status(u16),

    #[error("peer refused with code {code}: {message}")]
    Refused { code: u16, message: String },

    #[error("invalid peer response: {0}")]
    Decode(String),
}

impl PeerError {
    /// Whether the peer could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, PeerError::Transport(_) | PeerError::Status(_))
    }
}

#[derive(Clone)]
pub struct PeerClient {
    http_client: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http_client }
    }

    /// Ask a peer who it is.
    pub async fn info(&self, endpoint: &str) -> Result<NodeInfo, PeerError> {
        let response = self
            .http_client
            .get(url(endpoint, "/info"))
            .send()
            .await
            .map_err(|e| PeerError::Transport(e.to_string()))?;
        let envelope = read_envelope(response).await?;
        decode_data(envelope)
    }

    pub async fn broadcast(&self, endpoint: &str, tx: &Transaction) -> Result<(), PeerError> {
        self.post(endpoint, "/broadcast", tx).await
    }

    pub async fn broadcast_submit(
        &self,
        endpoint: &str,
        relay: &SubmitRelay,
    ) -> Result<(), PeerError> {
        self.post(endpoint, "/broadcastSubmit", relay).await
    }

    async fn post<B: Serialize + Sync>(
        &self,
        endpoint: &str,
        path: &str,
        body: &B,
    ) -> Result<(), PeerError> {
        let response = self
            .http_client
            .post(url(endpoint, path))
            .json(body)
            .send()
            .await
            .map_err(|e| PeerError::Transport(e.to_string()))?;
        read_envelope(response).await.map(|_| ())
    }
}

impl Default for PeerClient {
    fn default() -> Self {
        Self::new()
    }
}

fn url(endpoint: &str, path: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), path)
}

async fn read_envelope(response: reqwest::Response) -> Result<Envelope, PeerError> {
    let status = response.status();
    if !status.is_success() {
        return Err(PeerError::Status(status.as_u16()));
    }
    let envelope: Envelope = response
        .json()
        .await
        .map_err(|e| PeerError::Decode(e.to_string()))?;
    if envelope.is_ok() {
        Ok(envelope)
    } else {
        Err(PeerError::Refused {
            code: envelope.code,
            message: envelope.message().to_string(),
        })
    }
}

fn decode_data<T: DeserializeOwned>(envelope: Envelope) -> Result<T, PeerError> {
    let data = envelope
        .data
        .ok_or_else(|| PeerError::Decode("missing data".into()))?;
    serde_json::from_value(data).map_err(|e| PeerError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        assert_eq!(url("http://a:1/", "/info"), "http://a:1/info");
        assert_eq!(url("http://a:1", "/info"), "http://a:1/info");
    }

    #[tokio::test]
    async fn unreachable_peer_is_transport_error() {
        let client = PeerClient::new();
        let err = client.info("http://127.0.0.1:1").await.unwrap_err();
        assert!(err.is_unreachable());
    }
}
