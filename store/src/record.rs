//! A validator's local view of one link request.

use linkid_types::{Address, IdentifierHash, RequestId, Signature, Timestamp};
use serde::{Deserialize, Serialize};

/// Where a request is in this validator's workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessStep {
    None,
    /// Accepted over `/request`; the ledger write is queued.
    ReceivedRegister,
    /// Relayed by a peer over `/broadcast`.
    ReceivedBroadcast,
    SentCode,
    /// The user's code matched; a vote is queued.
    ReceivedCode,
    /// Ballot cast, request still pending on the ledger.
    Voted,
    Finished,
    Expired,
}

impl ProcessStep {
    /// Steps with queued work that must be resumed after a restart.
    pub fn has_pending_job(self) -> bool {
        matches!(
            self,
            ProcessStep::ReceivedRegister | ProcessStep::ReceivedBroadcast | ProcessStep::ReceivedCode
        )
    }

    /// This validator has nothing left to do for the request.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessStep::Voted | ProcessStep::Finished | ProcessStep::Expired
        )
    }
}

/// Progress of the verification code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationStatus {
    None,
    Sent,
    Confirmed,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub request_id: RequestId,
    /// Normalized phone number or e-mail address, used as the code recipient.
    pub identifier: String,
    pub identifier_hash: IdentifierHash,
    pub address: Address,
    pub nonce: u64,
    pub request_signature: Signature,
    /// Validator that accepted the request from the user.
    pub receiver: Address,
    /// The receiver's signature over the relayed transaction.
    pub receiver_signature: Signature,
    pub status: ValidationStatus,
    pub send_code: String,
    pub receive_code: String,
    pub expire: Timestamp,
    pub step: ProcessStep,
    pub updated_at: Timestamp,
}
