//! The link collection state machine.
//!
//! Per request id: `Pending → Accepted | Rejected`, both terminal. An
//! accepted request commits the identifier ↔ address mapping, which stays
//! one-to-one in both directions at all times.

use std::collections::HashMap;

use linkid_crypto::{reserved_identifier_hash, verify_request};
use linkid_types::{
    Address, Ballot, IdentifierHash, IdentifierKind, RequestId, Signature, Timestamp,
};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::event::LedgerEvent;
use crate::registry::{ValidatorEntry, ValidatorRegistry};
use crate::request::{decide, RequestRecord, RequestState};

#[derive(Clone, Debug)]
pub struct LinkCollection {
    kind: IdentifierKind,
    reserved: IdentifierHash,
    registry: ValidatorRegistry,
    requests: HashMap<RequestId, RequestRecord>,
    to_address: HashMap<IdentifierHash, Address>,
    to_identifier: HashMap<Address, IdentifierHash>,
    nonces: HashMap<Address, u64>,
    events: Vec<LedgerEvent>,
}

impl LinkCollection {
    pub fn new(kind: IdentifierKind, validators: &[Address]) -> Self {
        Self::with_start(kind, validators, Timestamp::now())
    }

    pub fn with_start(kind: IdentifierKind, validators: &[Address], start: Timestamp) -> Self {
        Self {
            kind,
            reserved: reserved_identifier_hash(kind),
            registry: ValidatorRegistry::new(validators, start),
            requests: HashMap::new(),
            to_address: HashMap::new(),
            to_identifier: HashMap::new(),
            nonces: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn identifier_kind(&self) -> IdentifierKind {
        self.kind
    }

    // ── Views ───────────────────────────────────────────────────────────

    pub fn validators(&self) -> &[ValidatorEntry] {
        self.registry.validators()
    }

    pub fn validator(&self, index: u32) -> Result<&ValidatorEntry, LedgerError> {
        self.registry.get(index)
    }

    pub fn validator_len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_validator(&self, address: &Address) -> bool {
        self.registry.is_active(address)
    }

    pub fn nonce_of(&self, address: &Address) -> u64 {
        self.nonces.get(address).copied().unwrap_or(0)
    }

    pub fn to_address(&self, hash: &IdentifierHash) -> Option<Address> {
        self.to_address.get(hash).copied()
    }

    pub fn to_identifier(&self, address: &Address) -> Option<IdentifierHash> {
        self.to_identifier.get(address).copied()
    }

    /// True iff no request has ever been recorded under `id`.
    pub fn is_available(&self, id: &RequestId) -> bool {
        !self.requests.contains_key(id)
    }

    pub fn request(&self, id: &RequestId) -> Option<&RequestRecord> {
        self.requests.get(id)
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    // ── Transitions ─────────────────────────────────────────────────────

    /// Record a new pending request and consume the claimant's nonce.
    pub fn add_request(
        &mut self,
        id: RequestId,
        hash: IdentifierHash,
        address: Address,
        signature: Signature,
    ) -> Result<(), LedgerError> {
        if hash == self.reserved {
            return Err(LedgerError::InvalidIdentifierHash);
        }
        if !self.is_available(&id) {
            return Err(LedgerError::DuplicateRequest);
        }
        if !verify_request(&address, &hash, self.nonce_of(&address), &signature) {
            return Err(LedgerError::InvalidSignature);
        }
        if self.to_address.contains_key(&hash) {
            return Err(LedgerError::DuplicateIdentifier);
        }
        if self.to_identifier.contains_key(&address) {
            return Err(LedgerError::DuplicateAddress);
        }

        self.requests
            .insert(id, RequestRecord::new(id, hash, address, signature));
        *self.nonces.entry(address).or_insert(0) += 1;
        self.events.push(LedgerEvent::AddedRequestItem {
            id,
            identifier_hash: hash,
            address,
        });
        debug!(request_id = %id, %address, "link request added");
        Ok(())
    }

    /// Record `sender`'s ballot and finalize the request if it now has a
    /// strict majority. Returns the state after the vote.
    pub fn vote_request(
        &mut self,
        sender: &Address,
        id: &RequestId,
        ballot: Ballot,
    ) -> Result<RequestState, LedgerError> {
        if !self.registry.is_active(sender) {
            return Err(LedgerError::NotValidator);
        }
        if ballot == Ballot::None {
            return Err(LedgerError::InvalidBallot);
        }
        let quorum_base = self.registry.active_count();
        let record = self.requests.get_mut(id).ok_or(LedgerError::UnknownRequest)?;
        if record.has_voted(sender) {
            return Err(LedgerError::AlreadyVoted);
        }
        if record.state.is_final() {
            return Err(LedgerError::UnknownRequest);
        }

        record.ballots.insert(*sender, ballot);
        let Some(outcome) = decide(&record.tally(), quorum_base) else {
            return Ok(RequestState::Pending);
        };

        let (hash, address) = (record.identifier_hash, record.address);
        let outcome = match outcome {
            RequestState::Accepted
                if self.to_address.contains_key(&hash)
                    || self.to_identifier.contains_key(&address) =>
            {
                RequestState::Rejected
            }
            other => other,
        };
        self.finalize(*id, hash, address, outcome);
        Ok(outcome)
    }

    fn finalize(
        &mut self,
        id: RequestId,
        identifier_hash: IdentifierHash,
        address: Address,
        outcome: RequestState,
    ) {
        if let Some(record) = self.requests.get_mut(&id) {
            record.state = outcome;
        }
        let event = if outcome == RequestState::Accepted {
            self.to_address.insert(identifier_hash, address);
            self.to_identifier.insert(address, identifier_hash);
            LedgerEvent::AcceptedRequestItem {
                id,
                identifier_hash,
                address,
            }
        } else {
            LedgerEvent::RejectedRequestItem {
                id,
                identifier_hash,
                address,
            }
        };
        self.events.push(event);
        info!(request_id = %id, %address, state = ?outcome, "link request finalized");
    }

    /// Move an existing link from `old_address` to `new_address`. Both
    /// parties sign the request message against their own current nonce.
    pub fn update(
        &mut self,
        hash: IdentifierHash,
        old_address: Address,
        old_signature: Signature,
        new_address: Address,
        new_signature: Signature,
    ) -> Result<(), LedgerError> {
        if self.to_address(&hash) != Some(old_address) {
            return Err(LedgerError::UnknownLink);
        }
        if !verify_request(&old_address, &hash, self.nonce_of(&old_address), &old_signature) {
            return Err(LedgerError::InvalidSignature);
        }
        if !verify_request(&new_address, &hash, self.nonce_of(&new_address), &new_signature) {
            return Err(LedgerError::InvalidSignature);
        }
        if self.to_identifier.contains_key(&new_address) {
            return Err(LedgerError::DuplicateAddress);
        }

        self.to_identifier.remove(&old_address);
        self.to_identifier.insert(new_address, hash);
        self.to_address.insert(hash, new_address);
        *self.nonces.entry(old_address).or_insert(0) += 1;
        *self.nonces.entry(new_address).or_insert(0) += 1;
        self.events.push(LedgerEvent::UpdatedLinkItem {
            identifier_hash: hash,
            old_address,
            new_address,
        });
        info!(%old_address, %new_address, "link moved");
        Ok(())
    }

    pub fn update_endpoint(&mut self, sender: &Address, endpoint: &str) -> Result<(), LedgerError> {
        self.registry.update_endpoint(sender, endpoint)?;
        debug!(validator = %sender, endpoint, "validator endpoint updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkid_crypto::{identifier_hash, request_id, sign_request, SigningIdentity};
    use linkid_types::PrivateKey;

    struct Fixture {
        collection: LinkCollection,
        validators: Vec<SigningIdentity>,
        users: Vec<SigningIdentity>,
    }

    fn identity(seed: u8) -> SigningIdentity {
        SigningIdentity::from_private(&PrivateKey([seed; 32])).unwrap()
    }

    fn fixture(validator_count: u8) -> Fixture {
        let validators: Vec<_> = (1..=validator_count).map(identity).collect();
        let users: Vec<_> = (100..104).map(identity).collect();
        let addresses: Vec<_> = validators.iter().map(|v| v.address()).collect();
        Fixture {
            collection: LinkCollection::with_start(
                IdentifierKind::Email,
                &addresses,
                Timestamp::EPOCH,
            ),
            validators,
            users,
        }
    }

    fn add(
        collection: &mut LinkCollection,
        user: &SigningIdentity,
        identifier: &str,
    ) -> Result<RequestId, LedgerError> {
        let hash = identifier_hash(IdentifierKind::Email, identifier);
        let nonce = collection.nonce_of(&user.address());
        let sig = sign_request(user, &hash, nonce).unwrap();
        let id = request_id(&hash, &user.address(), nonce);
        collection.add_request(id, hash, user.address(), sig)?;
        Ok(id)
    }

    #[test]
    fn accepted_after_majority_agreement() {
        let mut f = fixture(3);
        let user = &f.users[0];
        let id = add(&mut f.collection, user, "abc@example.com").unwrap();
        let hash = identifier_hash(IdentifierKind::Email, "abc@example.com");

        let v = &f.validators;
        assert_eq!(
            f.collection.vote_request(&v[1].address(), &id, Ballot::Agreement),
            Ok(RequestState::Pending)
        );
        assert_eq!(
            f.collection.vote_request(&v[2].address(), &id, Ballot::Agreement),
            Ok(RequestState::Accepted)
        );
        assert_eq!(f.collection.to_address(&hash), Some(user.address()));
        assert_eq!(f.collection.to_identifier(&user.address()), Some(hash));

        // a vote after finalization must not re-finalize
        assert_eq!(
            f.collection.vote_request(&v[0].address(), &id, Ballot::Agreement),
            Err(LedgerError::UnknownRequest)
        );
        let accepted = f
            .collection
            .events()
            .iter()
            .filter(|e| matches!(e, LedgerEvent::AcceptedRequestItem { .. }))
            .count();
        assert_eq!(accepted, 1);
    }

    #[test]
    fn rejected_after_majority_opposition() {
        let mut f = fixture(3);
        let id = add(&mut f.collection, &f.users[0], "abc@example.com").unwrap();
        let v = &f.validators;
        f.collection
            .vote_request(&v[0].address(), &id, Ballot::Opposition)
            .unwrap();
        assert_eq!(
            f.collection.vote_request(&v[1].address(), &id, Ballot::Opposition),
            Ok(RequestState::Rejected)
        );
        assert_eq!(f.collection.to_identifier(&f.users[0].address()), None);
        assert_eq!(f.collection.request(&id).unwrap().state, RequestState::Rejected);
    }

    #[test]
    fn second_vote_from_same_validator_fails() {
        let mut f = fixture(3);
        let id = add(&mut f.collection, &f.users[0], "abc@example.com").unwrap();
        let voter = f.validators[0].address();
        f.collection.vote_request(&voter, &id, Ballot::Agreement).unwrap();
        assert_eq!(
            f.collection.vote_request(&voter, &id, Ballot::Opposition),
            Err(LedgerError::AlreadyVoted)
        );
        assert_eq!(f.collection.request(&id).unwrap().tally().agreement, 1);
        assert_eq!(f.collection.request(&id).unwrap().tally().opposition, 0);
    }

    #[test]
    fn outsiders_and_empty_ballots_cannot_vote() {
        let mut f = fixture(3);
        let id = add(&mut f.collection, &f.users[0], "abc@example.com").unwrap();
        assert_eq!(
            f.collection
                .vote_request(&f.users[1].address(), &id, Ballot::Agreement),
            Err(LedgerError::NotValidator)
        );
        assert_eq!(
            f.collection
                .vote_request(&f.validators[0].address(), &id, Ballot::None),
            Err(LedgerError::InvalidBallot)
        );
        assert_eq!(
            f.collection.vote_request(
                &f.validators[0].address(),
                &RequestId::new([9; 32]),
                Ballot::Agreement
            ),
            Err(LedgerError::UnknownRequest)
        );
    }

    #[test]
    fn duplicate_identifier_leaves_state_untouched() {
        let mut f = fixture(1);
        let id = add(&mut f.collection, &f.users[0], "abc@example.com").unwrap();
        f.collection
            .vote_request(&f.validators[0].address(), &id, Ballot::Agreement)
            .unwrap();

        let other = &f.users[1];
        let events_before = f.collection.events().len();
        assert_eq!(
            add(&mut f.collection, other, "abc@example.com"),
            Err(LedgerError::DuplicateIdentifier)
        );
        assert_eq!(f.collection.nonce_of(&other.address()), 0);
        assert_eq!(f.collection.events().len(), events_before);
    }

    #[test]
    fn duplicate_address_is_rejected() {
        let mut f = fixture(1);
        let user = &f.users[0];
        let id = add(&mut f.collection, user, "abc@example.com").unwrap();
        f.collection
            .vote_request(&f.validators[0].address(), &id, Ballot::Agreement)
            .unwrap();
        assert_eq!(
            add(&mut f.collection, user, "other@example.com"),
            Err(LedgerError::DuplicateAddress)
        );
    }

    #[test]
    fn reserved_hash_is_rejected_even_with_valid_signature() {
        let mut f = fixture(3);
        let user = &f.users[0];
        let hash = reserved_identifier_hash(IdentifierKind::Email);
        let sig = sign_request(user, &hash, 0).unwrap();
        assert_eq!(
            f.collection
                .add_request(RequestId::new([1; 32]), hash, user.address(), sig),
            Err(LedgerError::InvalidIdentifierHash)
        );
        assert_eq!(add(&mut f.collection, user, "   "), Err(LedgerError::InvalidIdentifierHash));
    }

    #[test]
    fn availability_flips_on_add() {
        let mut f = fixture(3);
        let user = &f.users[0];
        let hash = identifier_hash(IdentifierKind::Email, "abc@example.com");
        let id = request_id(&hash, &user.address(), 0);
        assert!(f.collection.is_available(&id));
        let sig = sign_request(user, &hash, 0).unwrap();
        f.collection.add_request(id, hash, user.address(), sig).unwrap();
        assert!(!f.collection.is_available(&id));
        assert_eq!(
            f.collection.add_request(id, hash, user.address(), sig),
            Err(LedgerError::DuplicateRequest)
        );
    }

    #[test]
    fn stale_nonce_is_rejected() {
        let mut f = fixture(3);
        let user = &f.users[0];
        let hash = identifier_hash(IdentifierKind::Email, "abc@example.com");
        let sig = sign_request(user, &hash, 0).unwrap();
        f.collection
            .add_request(RequestId::new([1; 32]), hash, user.address(), sig)
            .unwrap();
        assert_eq!(f.collection.nonce_of(&user.address()), 1);
        assert_eq!(
            f.collection
                .add_request(RequestId::new([2; 32]), hash, user.address(), sig),
            Err(LedgerError::InvalidSignature)
        );
    }

    #[test]
    fn racing_requests_for_one_identifier_accept_only_once() {
        let mut f = fixture(1);
        let first = add(&mut f.collection, &f.users[0], "abc@example.com").unwrap();
        let second = add(&mut f.collection, &f.users[1], "abc@example.com").unwrap();
        let voter = f.validators[0].address();
        assert_eq!(
            f.collection.vote_request(&voter, &first, Ballot::Agreement),
            Ok(RequestState::Accepted)
        );
        assert_eq!(
            f.collection.vote_request(&voter, &second, Ballot::Agreement),
            Ok(RequestState::Rejected)
        );
        let hash = identifier_hash(IdentifierKind::Email, "abc@example.com");
        assert_eq!(f.collection.to_address(&hash), Some(f.users[0].address()));
    }

    #[test]
    fn update_moves_link_and_bumps_nonces() {
        let mut f = fixture(1);
        let (old, new) = (&f.users[0], &f.users[1]);
        let id = add(&mut f.collection, old, "abc@example.com").unwrap();
        f.collection
            .vote_request(&f.validators[0].address(), &id, Ballot::Agreement)
            .unwrap();
        let hash = identifier_hash(IdentifierKind::Email, "abc@example.com");

        let old_sig = sign_request(old, &hash, f.collection.nonce_of(&old.address())).unwrap();
        let new_sig = sign_request(new, &hash, f.collection.nonce_of(&new.address())).unwrap();
        let bad_sig = sign_request(new, &hash, 7).unwrap();
        assert_eq!(
            f.collection
                .update(hash, old.address(), old_sig, new.address(), bad_sig),
            Err(LedgerError::InvalidSignature)
        );
        f.collection
            .update(hash, old.address(), old_sig, new.address(), new_sig)
            .unwrap();

        assert_eq!(f.collection.to_address(&hash), Some(new.address()));
        assert_eq!(f.collection.to_identifier(&old.address()), None);
        assert_eq!(f.collection.nonce_of(&old.address()), 2);
        assert_eq!(f.collection.nonce_of(&new.address()), 1);
        assert!(matches!(
            f.collection.events().last(),
            Some(LedgerEvent::UpdatedLinkItem { .. })
        ));
    }

    #[test]
    fn update_requires_existing_link() {
        let mut f = fixture(1);
        let (old, new) = (&f.users[0], &f.users[1]);
        let hash = identifier_hash(IdentifierKind::Email, "abc@example.com");
        let old_sig = sign_request(old, &hash, 0).unwrap();
        let new_sig = sign_request(new, &hash, 0).unwrap();
        assert_eq!(
            f.collection
                .update(hash, old.address(), old_sig, new.address(), new_sig),
            Err(LedgerError::UnknownLink)
        );
    }

    #[test]
    fn endpoint_updates_are_sender_bound() {
        let mut f = fixture(2);
        let v1 = f.validators[1].address();
        f.collection.update_endpoint(&v1, "http://10.0.0.2:7070").unwrap();
        assert_eq!(f.collection.validator(1).unwrap().endpoint, "http://10.0.0.2:7070");
        assert_eq!(
            f.collection
                .update_endpoint(&f.users[0].address(), "http://evil"),
            Err(LedgerError::NotValidator)
        );
    }
}
