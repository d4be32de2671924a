//! Verification codes.
//!
//! Each validator issues a two-digit code. A user who heard from every
//! validator submits the concatenation ordered by validator index; each
//! validator checks only its own two-digit slice, so no validator learns
//! the full code.

use rand::Rng;

use crate::config::AuthenticationMode;

pub const CODE_LEN: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeGenerator {
    /// The validator index, zero padded.
    Known,
    Random,
}

impl CodeGenerator {
    pub fn for_mode(mode: AuthenticationMode) -> Self {
        match mode {
            AuthenticationMode::YesSendUnknownCode => CodeGenerator::Random,
            _ => CodeGenerator::Known,
        }
    }

    pub fn generate(&self, index: u32) -> String {
        match self {
            CodeGenerator::Known => format!("{:02}", index % 100),
            CodeGenerator::Random => format!("{:02}", rand::thread_rng().gen_range(0..100u32)),
        }
    }
}

/// The part of a combined code that belongs to validator `index`.
pub fn slice_for(combined: &str, index: u32) -> Option<&str> {
    let start = index as usize * CODE_LEN;
    combined.trim().get(start..start + CODE_LEN)
}
