//! Signing identities and address derivation.

use k256::ecdsa::{SigningKey, VerifyingKey};
use linkid_types::{Address, PrivateKey, Signature};
use rand::rngs::OsRng;

use crate::error::CryptoError;
use crate::hash::keccak256;
use crate::sign::sign_digest;

/// Derive the address of a public key: the last 20 bytes of the Keccak-256
/// digest of the uncompressed point without its `0x04` tag.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::new(bytes)
}

/// Derive the address controlled by a secret key.
pub fn address_from_private(private: &PrivateKey) -> Result<Address, CryptoError> {
    SigningIdentity::from_private(private).map(|id| id.address())
}

/// A secret key together with the address it controls.
pub struct SigningIdentity {
    key: SigningKey,
    address: Address,
}

impl SigningIdentity {
    pub fn from_private(private: &PrivateKey) -> Result<Self, CryptoError> {
        let key = SigningKey::from_slice(&private.0).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self::from_signing_key(key))
    }

    /// Generate a fresh identity from the OS random source.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    fn from_signing_key(key: SigningKey) -> Self {
        let address = address_from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte message hash as a personal message.
    pub fn sign(&self, message_hash: &[u8; 32]) -> Result<Signature, CryptoError> {
        sign_digest(&self.key, message_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_key_derives_known_address() {
        let private = PrivateKey::parse(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        let address = address_from_private(&private).unwrap();
        assert_eq!(
            address,
            Address::parse("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );
    }

    #[test]
    fn zero_key_is_rejected() {
        assert!(matches!(
            SigningIdentity::from_private(&PrivateKey([0u8; 32])),
            Err(CryptoError::InvalidKey)
        ));
    }

    #[test]
    fn generated_identities_differ() {
        assert_ne!(SigningIdentity::generate().address(), SigningIdentity::generate().address());
    }
}
