use proptest::prelude::*;

use linkid_types::{Address, Ballot, IdentifierHash, RequestId, Signature, Timestamp};

proptest! {
    /// Upper- and lower-case spellings of an address parse to the same value.
    #[test]
    fn address_parse_ignores_case(bytes in prop::array::uniform20(0u8..)) {
        let addr = Address::new(bytes);
        let upper = format!("0x{}", addr.to_string()[2..].to_uppercase());
        prop_assert_eq!(Address::parse(&upper).unwrap(), addr);
    }

    /// Displayed digests parse back to the same digest.
    #[test]
    fn request_id_display_parses(bytes in prop::array::uniform32(0u8..)) {
        let id = RequestId::new(bytes);
        prop_assert_eq!(RequestId::parse(&id.to_string()).unwrap(), id);
    }

    /// is_zero is true only for all-zero bytes.
    #[test]
    fn identifier_hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let hash = IdentifierHash::new(bytes);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// Strings of the wrong length never parse as signatures.
    #[test]
    fn signature_rejects_short_input(len in 0usize..65) {
        let s = format!("0x{}", "ab".repeat(len));
        prop_assert!(Signature::parse(&s).is_err());
    }

    /// Only the four defined discriminants decode as ballots.
    #[test]
    fn ballot_discriminants(v in 0u8..=255) {
        prop_assert_eq!(Ballot::try_from(v).is_ok(), v <= 3);
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }
}

#[test]
fn hashes_survive_bincode() {
    let id = RequestId::new([7u8; 32]);
    let encoded = bincode::serialize(&id).unwrap();
    let decoded: RequestId = bincode::deserialize(&encoded).unwrap();
    assert_eq!(decoded, id);
}
