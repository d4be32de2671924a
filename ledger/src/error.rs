use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons the collection refuses a call. Nothing is mutated when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum LedgerError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("identifier is already linked")]
    DuplicateIdentifier,

    #[error("address is already linked")]
    DuplicateAddress,

    #[error("invalid identifier hash")]
    InvalidIdentifierHash,

    #[error("request id is already in use")]
    DuplicateRequest,

    #[error("sender is not a registered validator")]
    NotValidator,

    #[error("validator has already voted on this request")]
    AlreadyVoted,

    #[error("no pending request with this id")]
    UnknownRequest,

    #[error("ballot must be agreement, opposition or abstaining")]
    InvalidBallot,

    #[error("identifier is not linked to the given address")]
    UnknownLink,

    #[error("no validator at index {0}")]
    UnknownValidator(u32),
}
