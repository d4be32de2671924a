//! Sender authorisation for validator-only writes.
//!
//! The caller signs `keccak256(abi.encode(string method, bytes32 payload,
//! uint256 sequence))`. The server recovers the signer and accepts each
//! sender's sequence numbers only in strictly increasing order, so a
//! captured call cannot be replayed.

use std::collections::HashMap;

use linkid_crypto::abi::{encode, Token};
use linkid_crypto::{keccak256, verify_digest, CryptoError, SigningIdentity};
use linkid_types::{Address, Ballot, RequestId, Signature};
use serde::{Deserialize, Serialize};

pub const VOTE_METHOD: &str = "voteRequest";
pub const ENDPOINT_METHOD: &str = "updateEndpoint";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAuth {
    pub sender: Address,
    pub sequence: u64,
    pub signature: Signature,
}

fn call_digest(method: &str, payload: &[u8; 32], sequence: u64) -> [u8; 32] {
    keccak256(&encode(&[
        Token::String(method),
        Token::Bytes32(payload),
        Token::Uint(sequence),
    ]))
}

impl CallAuth {
    pub fn sign(
        identity: &SigningIdentity,
        method: &str,
        payload: &[u8; 32],
        sequence: u64,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            sender: identity.address(),
            sequence,
            signature: identity.sign(&call_digest(method, payload, sequence))?,
        })
    }

    pub fn verify(&self, method: &str, payload: &[u8; 32]) -> bool {
        verify_digest(
            &self.sender,
            &call_digest(method, payload, self.sequence),
            &self.signature,
        )
    }
}

pub fn vote_payload(id: &RequestId, ballot: Ballot) -> [u8; 32] {
    keccak256(&encode(&[
        Token::Bytes32(id.as_bytes()),
        Token::Uint(u8::from(ballot) as u64),
    ]))
}

pub fn endpoint_payload(endpoint: &str) -> [u8; 32] {
    keccak256(&encode(&[Token::String(endpoint)]))
}

/// Highest sequence seen per sender.
#[derive(Debug, Default)]
pub struct SequenceGuard {
    last: HashMap<Address, u64>,
}

impl SequenceGuard {
    /// Accept `sequence` iff it is above the last one accepted for `sender`.
    pub fn advance(&mut self, sender: &Address, sequence: u64) -> bool {
        match self.last.get(sender) {
            Some(&last) if sequence <= last => false,
            _ => {
                self.last.insert(*sender, sequence);
                true
            }
        }
    }

    /// Number of senders with a recorded sequence.
    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkid_types::PrivateKey;

    fn identity() -> SigningIdentity {
        SigningIdentity::from_private(&PrivateKey([0x21; 32])).unwrap()
    }

    #[test]
    fn signed_call_verifies_only_for_its_payload() {
        let id = identity();
        let payload = vote_payload(&RequestId::new([1; 32]), Ballot::Agreement);
        let auth = CallAuth::sign(&id, VOTE_METHOD, &payload, 10).unwrap();
        assert!(auth.verify(VOTE_METHOD, &payload));
        assert!(!auth.verify(ENDPOINT_METHOD, &payload));

        let other = vote_payload(&RequestId::new([1; 32]), Ballot::Opposition);
        assert!(!auth.verify(VOTE_METHOD, &other));

        let mut bumped = auth.clone();
        bumped.sequence += 1;
        assert!(!bumped.verify(VOTE_METHOD, &payload));
    }

    #[test]
    fn sequences_must_increase() {
        let mut guard = SequenceGuard::default();
        let a = Address::new([1; 20]);
        let b = Address::new([2; 20]);
        assert!(guard.advance(&a, 5));
        assert!(!guard.advance(&a, 5));
        assert!(!guard.advance(&a, 4));
        assert!(guard.advance(&a, 6));
        assert!(guard.advance(&b, 1));
    }
}
