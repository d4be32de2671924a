//! The node's view of the collection.
//!
//! A [`LedgerClient`] is bound to one sender address, the way a contract
//! handle is bound to a wallet: validator-only calls are authorised by the
//! address the client was connected with.

use std::sync::Arc;

use async_trait::async_trait;
use linkid_types::{Address, Ballot, IdentifierHash, IdentifierKind, RequestId, Signature};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::collection::LinkCollection;
use crate::error::LedgerError;
use crate::registry::ValidatorEntry;
use crate::request::{RequestRecord, RequestState};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ClientError {
    /// The collection refused the call; retrying will not help.
    #[error("ledger rejected call: {0}")]
    Rejected(#[from] LedgerError),

    /// The call never reached the collection.
    #[error("ledger unreachable: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address every write is sent from.
    fn sender(&self) -> Address;

    async fn identifier_kind(&self) -> Result<IdentifierKind, ClientError>;
    async fn validators(&self) -> Result<Vec<ValidatorEntry>, ClientError>;
    async fn validator(&self, index: u32) -> Result<ValidatorEntry, ClientError>;
    async fn validator_len(&self) -> Result<usize, ClientError>;
    async fn nonce_of(&self, address: &Address) -> Result<u64, ClientError>;
    async fn to_address(&self, hash: &IdentifierHash) -> Result<Option<Address>, ClientError>;
    async fn to_identifier(&self, address: &Address)
        -> Result<Option<IdentifierHash>, ClientError>;
    async fn is_available(&self, id: &RequestId) -> Result<bool, ClientError>;
    async fn request(&self, id: &RequestId) -> Result<Option<RequestRecord>, ClientError>;

    async fn add_request(
        &self,
        id: RequestId,
        hash: IdentifierHash,
        address: Address,
        signature: Signature,
    ) -> Result<(), ClientError>;

    async fn vote_request(&self, id: RequestId, ballot: Ballot)
        -> Result<RequestState, ClientError>;

    async fn update(
        &self,
        hash: IdentifierHash,
        old_address: Address,
        old_signature: Signature,
        new_address: Address,
        new_signature: Signature,
    ) -> Result<(), ClientError>;

    async fn update_endpoint(&self, endpoint: &str) -> Result<(), ClientError>;
}

/// One collection shared by every node in the process.
#[derive(Clone)]
pub struct LocalLedger {
    inner: Arc<Mutex<LinkCollection>>,
}

impl LocalLedger {
    pub fn new(collection: LinkCollection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(collection)),
        }
    }

    /// A client that sends as `sender`.
    pub fn connect(&self, sender: Address) -> LocalLedgerClient {
        LocalLedgerClient {
            ledger: self.clone(),
            sender,
        }
    }

    /// Run `f` against the collection under the lock.
    pub async fn with<R>(&self, f: impl FnOnce(&mut LinkCollection) -> R) -> R {
        let mut collection = self.inner.lock().await;
        f(&mut collection)
    }
}

#[derive(Clone)]
pub struct LocalLedgerClient {
    ledger: LocalLedger,
    sender: Address,
}

#[async_trait]
impl LedgerClient for LocalLedgerClient {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn identifier_kind(&self) -> Result<IdentifierKind, ClientError> {
        Ok(self.ledger.with(|c| c.identifier_kind()).await)
    }

    async fn validators(&self) -> Result<Vec<ValidatorEntry>, ClientError> {
        Ok(self.ledger.with(|c| c.validators().to_vec()).await)
    }

    async fn validator(&self, index: u32) -> Result<ValidatorEntry, ClientError> {
        Ok(self.ledger.with(|c| c.validator(index).cloned()).await?)
    }

    async fn validator_len(&self) -> Result<usize, ClientError> {
        Ok(self.ledger.with(|c| c.validator_len()).await)
    }

    async fn nonce_of(&self, address: &Address) -> Result<u64, ClientError> {
        Ok(self.ledger.with(|c| c.nonce_of(address)).await)
    }

    async fn to_address(&self, hash: &IdentifierHash) -> Result<Option<Address>, ClientError> {
        Ok(self.ledger.with(|c| c.to_address(hash)).await)
    }

    async fn to_identifier(
        &self,
        address: &Address,
    ) -> Result<Option<IdentifierHash>, ClientError> {
        Ok(self.ledger.with(|c| c.to_identifier(address)).await)
    }

    async fn is_available(&self, id: &RequestId) -> Result<bool, ClientError> {
        Ok(self.ledger.with(|c| c.is_available(id)).await)
    }

    async fn request(&self, id: &RequestId) -> Result<Option<RequestRecord>, ClientError> {
        Ok(self.ledger.with(|c| c.request(id).cloned()).await)
    }

    async fn add_request(
        &self,
        id: RequestId,
        hash: IdentifierHash,
        address: Address,
        signature: Signature,
    ) -> Result<(), ClientError> {
        Ok(self
            .ledger
            .with(|c| c.add_request(id, hash, address, signature))
            .await?)
    }

    async fn vote_request(
        &self,
        id: RequestId,
        ballot: Ballot,
    ) -> Result<RequestState, ClientError> {
        let sender = self.sender;
        Ok(self
            .ledger
            .with(|c| c.vote_request(&sender, &id, ballot))
            .await?)
    }

    async fn update(
        &self,
        hash: IdentifierHash,
        old_address: Address,
        old_signature: Signature,
        new_address: Address,
        new_signature: Signature,
    ) -> Result<(), ClientError> {
        Ok(self
            .ledger
            .with(|c| c.update(hash, old_address, old_signature, new_address, new_signature))
            .await?)
    }

    async fn update_endpoint(&self, endpoint: &str) -> Result<(), ClientError> {
        let sender = self.sender;
        Ok(self
            .ledger
            .with(|c| c.update_endpoint(&sender, endpoint))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkid_crypto::{identifier_hash, request_id, sign_request, SigningIdentity};
    use linkid_types::PrivateKey;

    fn identity(seed: u8) -> SigningIdentity {
        SigningIdentity::from_private(&PrivateKey([seed; 32])).unwrap()
    }

    #[tokio::test]
    async fn clients_share_one_collection() {
        let validators: Vec<_> = (1..=3).map(identity).collect();
        let addresses: Vec<_> = validators.iter().map(|v| v.address()).collect();
        let ledger = LocalLedger::new(LinkCollection::new(IdentifierKind::Email, &addresses));
        let clients: Vec<_> = addresses.iter().map(|a| ledger.connect(*a)).collect();

        let user = identity(50);
        let hash = identifier_hash(IdentifierKind::Email, "abc@example.com");
        let nonce = clients[0].nonce_of(&user.address()).await.unwrap();
        let sig = sign_request(&user, &hash, nonce).unwrap();
        let id = request_id(&hash, &user.address(), nonce);
        clients[0]
            .add_request(id, hash, user.address(), sig)
            .await
            .unwrap();

        assert_eq!(
            clients[1].vote_request(id, Ballot::Agreement).await,
            Ok(RequestState::Pending)
        );
        assert_eq!(
            clients[2].vote_request(id, Ballot::Agreement).await,
            Ok(RequestState::Accepted)
        );
        assert_eq!(
            clients[0].to_identifier(&user.address()).await.unwrap(),
            Some(hash)
        );
    }

    #[tokio::test]
    async fn rejections_are_not_transport_errors() {
        let validator = identity(1);
        let ledger = LocalLedger::new(LinkCollection::new(
            IdentifierKind::Phone,
            &[validator.address()],
        ));
        let outsider = ledger.connect(identity(2).address());
        let err = outsider
            .vote_request(RequestId::new([1; 32]), Ballot::Agreement)
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Rejected(LedgerError::NotValidator));
        assert!(!err.is_transport());
        assert_eq!(
            outsider.validator(4).await,
            Err(ClientError::Rejected(LedgerError::UnknownValidator(4)))
        );
    }
}
