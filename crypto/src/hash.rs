//! Keccak-256 hashing and the identifier hasher.

use linkid_types::{IdentifierHash, IdentifierKind};
use sha3::{Digest, Keccak256};

use crate::abi::{self, Token};

/// Compute the Keccak-256 digest of arbitrary data.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn keccak256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash an identifier under its domain label:
/// `keccak256(abi.encode(string label, string normalized))`.
pub fn identifier_hash(kind: IdentifierKind, identifier: &str) -> IdentifierHash {
    let normalized = kind.normalize(identifier);
    let encoded = abi::encode(&[Token::String(kind.label()), Token::String(&normalized)]);
    IdentifierHash::new(keccak256(&encoded))
}

/// Digest of the empty identifier. Ledgers refuse requests carrying it.
pub fn reserved_identifier_hash(kind: IdentifierKind) -> IdentifierHash {
    identifier_hash(kind, "")
}
