//! Events appended by the collection on every state transition.

use linkid_types::{Address, IdentifierHash, RequestId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    AddedRequestItem {
        id: RequestId,
        identifier_hash: IdentifierHash,
        address: Address,
    },
    AcceptedRequestItem {
        id: RequestId,
        identifier_hash: IdentifierHash,
        address: Address,
    },
    RejectedRequestItem {
        id: RequestId,
        identifier_hash: IdentifierHash,
        address: Address,
    },
    UpdatedLinkItem {
        identifier_hash: IdentifierHash,
        old_address: Address,
        new_address: Address,
    },
}
