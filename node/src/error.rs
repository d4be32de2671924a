use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] linkid_ledger::ClientError),

    #[error("store error: {0}")]
    Store(#[from] linkid_store::StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] linkid_crypto::CryptoError),

    #[error("config error: {0}")]
    Config(String),

    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node not started")]
    NotStarted,

    #[error("{0}")]
    Other(String),
}
