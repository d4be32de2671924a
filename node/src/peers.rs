//! Peer directory: the other validators, as seen from this node.

use std::collections::{BTreeMap, HashSet};

use linkid_ledger::{ValidatorEntry, ValidatorStatus};
use linkid_types::Address;
use serde::{Deserialize, Serialize};

use crate::wire::NodeInfo;

// ---------------------------------------------------------------------------
// Peer state
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PeerStatus {
    /// Not checked yet.
    Unknown,
    Active,
    /// Unreachable at the last check or broadcast; checked again next cycle.
    Inactive,
    /// Answered with another identity. Never checked again by this process.
    Abnormal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub node_id: Address,
    pub index: u32,
    pub endpoint: String,
    pub version: String,
    pub status: PeerStatus,
}

/// Result of one `/info` health check.
#[derive(Clone, Debug)]
pub enum CheckOutcome {
    Answered(NodeInfo),
    Unreachable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

pub struct PeerDirectory {
    self_address: Address,
    self_index: Option<u32>,
    peers: BTreeMap<Address, Peer>,
    /// Active registry members, self included.
    validators: HashSet<Address>,
}

impl PeerDirectory {
    pub fn new(self_address: Address) -> Self {
        Self {
            self_address,
            self_index: None,
            peers: BTreeMap::new(),
            validators: HashSet::new(),
        }
    }

    /// Reconcile with the ledger's validator list.
    ///
    /// Inactive registry entries are dropped. An endpoint change resets the
    /// peer to `Unknown` unless it is `Abnormal`.
    pub fn apply_registry(&mut self, entries: &[ValidatorEntry]) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let active: Vec<&ValidatorEntry> = entries
            .iter()
            .filter(|e| e.status == ValidatorStatus::Active)
            .collect();

        self.validators = active.iter().map(|e| e.address).collect();
        self.self_index = active
            .iter()
            .find(|e| e.address == self.self_address)
            .map(|e| e.index);

        let before = self.peers.len();
        self.peers
            .retain(|address, _| active.iter().any(|e| e.address == *address));
        summary.removed = before - self.peers.len();

        for entry in active {
            if entry.address == self.self_address {
                continue;
            }
            match self.peers.get_mut(&entry.address) {
                Some(peer) => {
                    let mut changed = false;
                    if peer.endpoint != entry.endpoint {
                        peer.endpoint = entry.endpoint.clone();
                        if peer.status != PeerStatus::Abnormal {
                            peer.status = PeerStatus::Unknown;
                        }
                        changed = true;
                    }
                    if peer.index != entry.index {
                        peer.index = entry.index;
                        changed = true;
                    }
                    if changed {
                        summary.updated += 1;
                    }
                }
                None => {
                    self.peers.insert(
                        entry.address,
                        Peer {
                            node_id: entry.address,
                            index: entry.index,
                            endpoint: entry.endpoint.clone(),
                            version: String::new(),
                            status: PeerStatus::Unknown,
                        },
                    );
                    summary.added += 1;
                }
            }
        }
        summary
    }

    /// Peers worth probing: not `Abnormal` and with a published endpoint.
    pub fn check_targets(&self) -> Vec<Peer> {
        self.peers
            .values()
            .filter(|p| p.status != PeerStatus::Abnormal && !p.endpoint.is_empty())
            .cloned()
            .collect()
    }

    /// Apply a health check result; returns the new status.
    pub fn record_check(&mut self, node_id: &Address, outcome: CheckOutcome) -> Option<PeerStatus> {
        let peer = self.peers.get_mut(node_id)?;
        if peer.status == PeerStatus::Abnormal {
            return Some(PeerStatus::Abnormal);
        }
        peer.status = match outcome {
            CheckOutcome::Answered(info) if info.node_id == *node_id => {
                peer.version = info.version;
                PeerStatus::Active
            }
            CheckOutcome::Answered(_) => PeerStatus::Abnormal,
            CheckOutcome::Unreachable => PeerStatus::Inactive,
        };
        Some(peer.status)
    }

    /// A failed delivery demotes an active peer until the next health check.
    pub fn mark_unreachable(&mut self, node_id: &Address) {
        if let Some(peer) = self.peers.get_mut(node_id) {
            if peer.status == PeerStatus::Active {
                peer.status = PeerStatus::Inactive;
            }
        }
    }

    pub fn active(&self) -> Vec<Peer> {
        self.peers
            .values()
            .filter(|p| p.status == PeerStatus::Active)
            .cloned()
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.peers
            .values()
            .filter(|p| p.status == PeerStatus::Active)
            .count()
    }

    /// Every peer, ordered by validator index.
    pub fn list(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.peers.values().cloned().collect();
        peers.sort_by_key(|p| p.index);
        peers
    }

    pub fn get(&self, node_id: &Address) -> Option<&Peer> {
        self.peers.get(node_id)
    }

    pub fn self_index(&self) -> Option<u32> {
        self.self_index
    }

    pub fn is_validator(&self, address: &Address) -> bool {
        self.validators.contains(address)
    }

    /// Active validators, this node included.
    pub fn validator_count(&self) -> usize {
        self.validators.len()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkid_types::Timestamp;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn entry(byte: u8, index: u32, endpoint: &str) -> ValidatorEntry {
        ValidatorEntry {
            address: addr(byte),
            index,
            endpoint: endpoint.to_string(),
            status: ValidatorStatus::Active,
            start: Timestamp::EPOCH,
        }
    }

    fn info(byte: u8) -> NodeInfo {
        NodeInfo {
            node_id: addr(byte),
            endpoint: String::new(),
            version: "v1".into(),
        }
    }

    #[test]
    fn refresh_excludes_self() {
        let mut dir = PeerDirectory::new(addr(0xB));
        let summary = dir.apply_registry(&[
            entry(0xA, 0, "http://a"),
            entry(0xB, 1, "http://b"),
            entry(0xC, 2, "http://c"),
        ]);
        assert_eq!(summary.added, 2);
        let ids: Vec<Address> = dir.list().iter().map(|p| p.node_id).collect();
        assert_eq!(ids, vec![addr(0xA), addr(0xC)]);
        assert_eq!(dir.self_index(), Some(1));
        assert_eq!(dir.validator_count(), 3);
        assert!(dir.is_validator(&addr(0xB)));
    }

    #[test]
    fn refresh_removes_and_updates() {
        let mut dir = PeerDirectory::new(addr(0xB));
        dir.apply_registry(&[entry(0xA, 0, "http://a"), entry(0xC, 2, "http://c")]);
        dir.record_check(&addr(0xA), CheckOutcome::Answered(info(0xA)));

        let summary = dir.apply_registry(&[entry(0xA, 0, "http://a2")]);
        assert_eq!(summary, RefreshSummary { added: 0, removed: 1, updated: 1 });
        let peer = dir.get(&addr(0xA)).unwrap();
        assert_eq!(peer.endpoint, "http://a2");
        assert_eq!(peer.status, PeerStatus::Unknown);
        assert_eq!(dir.self_index(), None);
    }

    #[test]
    fn inactive_registry_entries_are_not_validators() {
        let mut dir = PeerDirectory::new(addr(0xB));
        let mut retired = entry(0xC, 2, "http://c");
        retired.status = ValidatorStatus::Inactive;
        dir.apply_registry(&[entry(0xA, 0, "http://a"), retired]);
        assert!(!dir.is_validator(&addr(0xC)));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn identity_mismatch_is_permanent() {
        let mut dir = PeerDirectory::new(addr(0xB));
        dir.apply_registry(&[entry(0xA, 0, "http://a")]);
        assert_eq!(
            dir.record_check(&addr(0xA), CheckOutcome::Answered(info(0xD))),
            Some(PeerStatus::Abnormal)
        );
        assert!(dir.check_targets().is_empty());
        assert_eq!(
            dir.record_check(&addr(0xA), CheckOutcome::Answered(info(0xA))),
            Some(PeerStatus::Abnormal)
        );
    }

    #[test]
    fn unreachable_peer_is_checked_again() {
        let mut dir = PeerDirectory::new(addr(0xB));
        dir.apply_registry(&[entry(0xA, 0, "http://a"), entry(0xC, 2, "")]);
        assert_eq!(dir.check_targets().len(), 1);
        dir.record_check(&addr(0xA), CheckOutcome::Answered(info(0xA)));
        assert_eq!(dir.active_count(), 1);
        dir.mark_unreachable(&addr(0xA));
        assert_eq!(dir.get(&addr(0xA)).unwrap().status, PeerStatus::Inactive);
        assert_eq!(dir.check_targets().len(), 1);
    }

    #[test]
    fn status_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&PeerStatus::Abnormal).unwrap(),
            "\"ABNORMAL\""
        );
    }
}
