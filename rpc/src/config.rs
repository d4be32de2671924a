//! Ledger service configuration.

use std::path::Path;

use linkid_types::{Address, IdentifierKind};
use serde::{Deserialize, Serialize};

use crate::error::RpcError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_identifier_kind")]
    pub identifier_kind: IdentifierKind,

    /// Ordered validator set; the position is the validator index.
    #[serde(default)]
    pub validators: Vec<Address>,
}

impl LedgerServiceConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, RpcError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RpcError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, RpcError> {
        toml::from_str(s).map_err(|e| RpcError::Config(format!("failed to parse config: {e}")))
    }
}

impl Default for LedgerServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            identifier_kind: default_identifier_kind(),
            validators: Vec::new(),
        }
    }
}

// ── Serde default helpers ────────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7080
}

fn default_identifier_kind() -> IdentifierKind {
    IdentifierKind::Phone
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_validator_list() {
        let cfg = LedgerServiceConfig::from_toml_str(
            r#"
            port = 9000
            identifier_kind = "email"
            validators = [
                "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
                "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
            ]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.identifier_kind, IdentifierKind::Email);
        assert_eq!(cfg.validators.len(), 2);
    }

    #[test]
    fn rejects_bad_address() {
        let err = LedgerServiceConfig::from_toml_str(r#"validators = ["0x12"]"#).unwrap_err();
        assert!(matches!(err, RpcError::Config(_)));
    }
}
