//! Canonical digests for every signed or derived protocol message.

use linkid_types::{Address, IdentifierHash, RequestId, Signature};

use crate::abi::{encode, Token};
use crate::error::CryptoError;
use crate::hash::keccak256;
use crate::keys::SigningIdentity;
use crate::sign::verify_digest;

/// `keccak256(abi.encode(bytes32 hash, address, uint256 nonce))`: the
/// message an address owner signs to claim an identifier.
pub fn request_hash(hash: &IdentifierHash, address: &Address, nonce: u64) -> [u8; 32] {
    keccak256(&encode(&[
        Token::Bytes32(hash.as_bytes()),
        Token::Address(address),
        Token::Uint(nonce),
    ]))
}

/// Sign a link request for `identity`'s own address.
pub fn sign_request(
    identity: &SigningIdentity,
    hash: &IdentifierHash,
    nonce: u64,
) -> Result<Signature, CryptoError> {
    identity.sign(&request_hash(hash, &identity.address(), nonce))
}

/// Check a link request signature against the nonce it claims.
///
/// Whether `nonce` is the address's *current* nonce is the ledger's call.
pub fn verify_request(
    address: &Address,
    hash: &IdentifierHash,
    nonce: u64,
    signature: &Signature,
) -> bool {
    verify_digest(address, &request_hash(hash, address, nonce), signature)
}

/// Derive a request id with a fresh random salt, so repeated identical
/// requests still receive distinct ids.
pub fn request_id(hash: &IdentifierHash, address: &Address, nonce: u64) -> RequestId {
    let salt: [u8; 32] = rand::random();
    request_id_with_salt(hash, address, nonce, &salt)
}

pub fn request_id_with_salt(
    hash: &IdentifierHash,
    address: &Address,
    nonce: u64,
    salt: &[u8; 32],
) -> RequestId {
    RequestId::new(keccak256(&encode(&[
        Token::Bytes32(hash.as_bytes()),
        Token::Address(address),
        Token::Uint(nonce),
        Token::Bytes32(salt),
    ])))
}

/// Digest a receiving validator signs when relaying a request to peers.
pub fn tx_hash(
    hash: &IdentifierHash,
    address: &Address,
    nonce: u64,
    request_id: &RequestId,
    receiver: &Address,
) -> [u8; 32] {
    keccak256(&encode(&[
        Token::Bytes32(hash.as_bytes()),
        Token::Address(address),
        Token::Uint(nonce),
        Token::Bytes32(request_id.as_bytes()),
        Token::Address(receiver),
    ]))
}

/// Digest a receiving validator signs when relaying a submitted code.
pub fn submit_hash(request_id: &RequestId, code: &str, receiver: &Address) -> [u8; 32] {
    keccak256(&encode(&[
        Token::Bytes32(request_id.as_bytes()),
        Token::String(code),
        Token::Address(receiver),
    ]))
}
