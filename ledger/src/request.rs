//! Pending link requests and the quorum rule.

use std::collections::BTreeMap;

use linkid_types::{Address, Ballot, IdentifierHash, RequestId, Signature};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Pending,
    Accepted,
    Rejected,
}

impl RequestState {
    pub fn is_final(self) -> bool {
        !matches!(self, RequestState::Pending)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub agreement: u32,
    pub opposition: u32,
    pub abstaining: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub identifier_hash: IdentifierHash,
    pub address: Address,
    pub signature: Signature,
    pub state: RequestState,
    /// One ballot per validator address.
    pub ballots: BTreeMap<Address, Ballot>,
}

impl RequestRecord {
    pub fn new(
        id: RequestId,
        identifier_hash: IdentifierHash,
        address: Address,
        signature: Signature,
    ) -> Self {
        Self {
            id,
            identifier_hash,
            address,
            signature,
            state: RequestState::Pending,
            ballots: BTreeMap::new(),
        }
    }

    pub fn has_voted(&self, validator: &Address) -> bool {
        self.ballots.contains_key(validator)
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for ballot in self.ballots.values() {
            match ballot {
                Ballot::Agreement => tally.agreement += 1,
                Ballot::Opposition => tally.opposition += 1,
                Ballot::Abstaining => tally.abstaining += 1,
                Ballot::None => {}
            }
        }
        tally
    }
}

/// Strict majority over `validators`: a side wins only with more than half
/// of the votes, so agreement and opposition can never both win.
pub fn decide(tally: &Tally, validators: usize) -> Option<RequestState> {
    let n = validators as u64;
    if n == 0 {
        return None;
    }
    if 2 * tally.agreement as u64 > n {
        Some(RequestState::Accepted)
    } else if 2 * tally.opposition as u64 > n {
        Some(RequestState::Rejected)
    } else {
        None
    }
}
