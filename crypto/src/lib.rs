//! Cryptographic primitives for identifier linking.
//!
//! - **Keccak-256** for identifier hashes, request ids and signed digests
//! - A minimal **ABI encoder** so digests match the ones computed on-chain
//! - **secp256k1** recoverable ECDSA over personal-message digests; an
//!   address is derived from the recovered public key, so verification
//!   needs no key registry

pub mod abi;
pub mod error;
pub mod hash;
pub mod keys;
pub mod messages;
pub mod sign;

pub use error::CryptoError;
pub use hash::{identifier_hash, keccak256, keccak256_multi, reserved_identifier_hash};
pub use keys::{address_from_private, SigningIdentity};
pub use messages::{
    request_hash, request_id, request_id_with_salt, sign_request, submit_hash, tx_hash,
    verify_request,
};
pub use sign::{personal_digest, recover_signer, sign_digest, verify_digest};
