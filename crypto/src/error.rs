use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid secret key")]
    InvalidKey,

    #[error("signing failed: {0}")]
    Signing(String),
}
