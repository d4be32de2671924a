//! The subset of the Solidity ABI encoding needed to reproduce on-chain
//! digests: static words for addresses, integers and `bytes32`, and
//! head/tail layout for dynamic strings.

use linkid_types::Address;

/// A value to be ABI-encoded.
#[derive(Clone, Copy, Debug)]
pub enum Token<'a> {
    Address(&'a Address),
    Uint(u64),
    Bytes32(&'a [u8; 32]),
    String(&'a str),
}

const WORD: usize = 32;

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Encode tokens as `abi.encode(...)` would.
pub fn encode(tokens: &[Token<'_>]) -> Vec<u8> {
    let head_len = WORD * tokens.len();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Address(addr) => {
                let mut word = [0u8; WORD];
                word[WORD - 20..].copy_from_slice(addr.as_bytes());
                head.extend_from_slice(&word);
            }
            Token::Uint(value) => head.extend_from_slice(&uint_word(*value)),
            Token::Bytes32(bytes) => head.extend_from_slice(*bytes),
            Token::String(s) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u64));
                tail.extend_from_slice(&uint_word(s.len() as u64));
                tail.extend_from_slice(s.as_bytes());
                let padding = (WORD - s.len() % WORD) % WORD;
                tail.resize(tail.len() + padding, 0);
            }
        }
    }

    head.extend_from_slice(&tail);
    head
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_tokens_are_one_word_each() {
        let addr = Address::new([0x11; 20]);
        let bytes = [0x22; 32];
        let out = encode(&[Token::Bytes32(&bytes), Token::Address(&addr), Token::Uint(5)]);
        assert_eq!(out.len(), 96);
        assert_eq!(&out[..32], &bytes);
        assert_eq!(&out[32..44], &[0u8; 12]);
        assert_eq!(&out[44..64], addr.as_bytes());
        assert_eq!(out[95], 5);
    }

    #[test]
    fn strings_use_offsets_and_padding() {
        let out = encode(&[Token::String("abc"), Token::String("")]);
        // head: two offsets; tail: len(3) + one padded word, then len(0)
        assert_eq!(out.len(), 5 * 32);
        assert_eq!(out[31], 0x40);
        assert_eq!(out[63], 0x80);
        assert_eq!(out[95], 3);
        assert_eq!(&out[96..99], b"abc");
        assert!(out[99..128].iter().all(|b| *b == 0));
        assert_eq!(out[159], 0);
    }

    #[test]
    fn string_after_static_word() {
        let id = [0xAA; 32];
        let out = encode(&[Token::Bytes32(&id), Token::String("00")]);
        assert_eq!(out[63], 0x40);
        assert_eq!(out[95], 2);
        assert_eq!(&out[96..98], b"00");
    }
}
