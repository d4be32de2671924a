//! Recoverable secp256k1 signatures over personal-message digests.
//!
//! A 32-byte message hash is never signed directly: it is first wrapped as
//! `keccak256("\x19Ethereum Signed Message:\n32" ‖ hash)`, so a signature
//! produced for this protocol cannot double as a raw transaction signature.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use linkid_types::{Address, Signature};

use crate::error::CryptoError;
use crate::hash::keccak256_multi;
use crate::keys::address_from_verifying_key;

const PERSONAL_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Wrap a 32-byte message hash into the digest that actually gets signed.
pub fn personal_digest(message_hash: &[u8; 32]) -> [u8; 32] {
    keccak256_multi(&[PERSONAL_PREFIX, message_hash])
}

/// Sign a message hash, returning `r ‖ s ‖ v` with `v ∈ {27, 28}`.
pub fn sign_digest(key: &SigningKey, message_hash: &[u8; 32]) -> Result<Signature, CryptoError> {
    let digest = personal_digest(message_hash);
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&sig.to_bytes());
    out[64] = 27 + recovery_id.to_byte();
    Ok(Signature(out))
}

/// Recover the address that signed `message_hash`.
///
/// Returns `None` for any malformed signature instead of failing loudly.
pub fn recover_signer(message_hash: &[u8; 32], signature: &Signature) -> Option<Address> {
    let bytes = signature.as_bytes();
    let sig = EcdsaSignature::from_slice(&bytes[..64]).ok()?;
    let v = match bytes[64] {
        27 | 28 => bytes[64] - 27,
        0 | 1 => bytes[64],
        _ => return None,
    };
    let recovery_id = RecoveryId::from_byte(v)?;
    let digest = personal_digest(message_hash);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id).ok()?;
    Some(address_from_verifying_key(&key))
}

/// Whether `signature` over `message_hash` was produced by `address`.
pub fn verify_digest(address: &Address, message_hash: &[u8; 32], signature: &Signature) -> bool {
    recover_signer(message_hash, signature).is_some_and(|signer| signer == *address)
}
