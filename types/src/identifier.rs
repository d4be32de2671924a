//! Off-chain identifier domains.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// The kind of off-chain identifier a ledger links to addresses.
///
/// Each kind hashes under its own domain-separation label, so a phone
/// number and an e-mail address can never produce the same digest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Phone,
    Email,
}

impl IdentifierKind {
    /// Domain-separation label mixed into every identifier hash.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Phone => "BOSagora Phone Number",
            Self::Email => "BOSagora Email",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phone => "phone",
            Self::Email => "email",
        }
    }

    /// Canonical form of an identifier before hashing: surrounding
    /// whitespace is dropped. Letter case is kept, so `User@Example.com`
    /// and `user@example.com` hash differently.
    pub fn normalize(&self, identifier: &str) -> String {
        identifier.trim().to_string()
    }

    /// Shape check applied at the HTTP boundary before any state change.
    pub fn is_well_formed(&self, identifier: &str) -> bool {
        let s = identifier.trim();
        match self {
            Self::Phone => (8..=16).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit()),
            Self::Email => {
                let Some((local, domain)) = s.split_once('@') else {
                    return false;
                };
                !local.is_empty()
                    && !domain.contains('@')
                    && !s.chars().any(char::is_whitespace)
                    && domain
                        .split_once('.')
                        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                    && !domain.ends_with('.')
            }
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentifierKind {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phone" => Ok(Self::Phone),
            "email" => Ok(Self::Email),
            other => Err(TypesError::UnknownKind(other.to_string())),
        }
    }
}
