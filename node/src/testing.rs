//! Fixtures shared by the unit tests of this crate.

use std::sync::Arc;

use linkid_crypto::{identifier_hash, sign_request, SigningIdentity};
use linkid_ledger::{LinkCollection, LocalLedger};
use linkid_nullables::{NullClock, NullValidationStore};
use linkid_types::{Address, IdentifierKind, PrivateKey};

use crate::config::{AuthenticationMode, NodeConfig};
use crate::context::NodeContext;
use crate::wire::LinkRequest;

pub const USER_EMAIL: &str = "abc@example.com";

pub fn identity(byte: u8) -> SigningIdentity {
    SigningIdentity::from_private(&PrivateKey([byte; 32])).expect("valid test key")
}

/// The node under test signs with key `0x21`; a second validator uses `0x22`.
pub struct Fixture {
    pub ctx: Arc<NodeContext>,
    pub clock: Arc<NullClock>,
    pub store: Arc<NullValidationStore>,
    pub ledger: LocalLedger,
    pub other: SigningIdentity,
}

pub fn fixture(mode: AuthenticationMode, init_wait_secs: u64) -> Fixture {
    fixture_with(NodeConfig {
        identifier_kind: IdentifierKind::Email,
        authentication_mode: mode,
        init_wait_secs,
        ..NodeConfig::default()
    })
}

pub fn fixture_with(config: NodeConfig) -> Fixture {
    let signer = identity(0x21);
    let other = identity(0x22);
    let ledger = LocalLedger::new(LinkCollection::new(
        IdentifierKind::Email,
        &[signer.address(), other.address()],
    ));
    let clock = Arc::new(NullClock::new(1_000));
    let store = Arc::new(NullValidationStore::new());
    let ctx = NodeContext::new(
        config,
        identity(0x21),
        Arc::new(ledger.connect(signer.address())),
        store.clone(),
        clock.clone(),
        "http://127.0.0.1:1".into(),
    );
    Fixture {
        ctx,
        clock,
        store,
        ledger,
        other,
    }
}

impl Fixture {
    /// Load the ledger's validator set into the peer directory.
    pub async fn refresh_peers(&self) {
        let entries = self.ledger.with(|c| c.validators().to_vec()).await;
        self.ctx.peers.write().await.apply_registry(&entries);
    }
}

/// `user`'s claim on [`USER_EMAIL`] at `nonce`.
pub fn signed_request(user: &SigningIdentity, nonce: u64) -> LinkRequest {
    let hash = identifier_hash(IdentifierKind::Email, USER_EMAIL);
    LinkRequest {
        identifier: USER_EMAIL.into(),
        address: user.address(),
        nonce,
        signature: sign_request(user, &hash, nonce).expect("signing succeeds"),
    }
}

pub fn user_address() -> Address {
    identity(0x11).address()
}
