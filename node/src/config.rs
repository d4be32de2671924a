//! Validator node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use linkid_types::IdentifierKind;

use crate::NodeError;

/// How a validator convinces itself that the requester controls the
/// identifier before voting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationMode {
    /// No code at all: vote agreement as soon as the request is registered.
    NoSendNoCode,
    /// Nothing is sent; each validator expects its index as a two-digit code.
    NoSendKnownCode,
    /// The index code is also delivered through the gateway.
    YesSendKnownCode,
    /// A random two-digit code is delivered through the gateway.
    YesSendUnknownCode,
}

impl AuthenticationMode {
    pub fn sends_code(self) -> bool {
        matches!(
            self,
            AuthenticationMode::YesSendKnownCode | AuthenticationMode::YesSendUnknownCode
        )
    }

    pub fn requires_code(self) -> bool {
        !matches!(self, AuthenticationMode::NoSendNoCode)
    }
}

/// SMS / e-mail delivery gateway.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub sender: String,
}

/// Configuration for a validator node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Interface the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server binds to; 0 picks an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host advertised to peers; falls back to `host` when empty.
    #[serde(default)]
    pub external_host: String,

    /// Scheme of the advertised endpoint.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Hex secp256k1 secret of this validator.
    #[serde(default)]
    pub validator_key: String,

    #[serde(default = "default_identifier_kind")]
    pub identifier_kind: IdentifierKind,

    #[serde(default = "default_authentication_mode")]
    pub authentication_mode: AuthenticationMode,

    /// Base URL of the ledger service.
    #[serde(default = "default_ledger_url")]
    pub ledger_url: String,

    /// Data directory for validation records.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Worker tick period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Grace window after start during which the worker only keeps time.
    #[serde(default = "default_init_wait_secs")]
    pub init_wait_secs: u64,

    /// Period of peer refresh, health check and expiry sweep.
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,

    /// Lifetime of a sent verification code.
    #[serde(default = "default_code_ttl_secs")]
    pub code_ttl_secs: u64,

    /// Maximum queued jobs; further requests are refused as busy.
    #[serde(default = "default_job_queue_capacity")]
    pub job_queue_capacity: usize,

    /// Attempts per job before a transport failure is given up on.
    #[serde(default = "default_max_job_attempts")]
    pub max_job_attempts: u32,

    /// How long finished validations stay in memory.
    #[serde(default = "default_finished_retention_secs")]
    pub finished_retention_secs: u64,

    /// Whether to expose Prometheus metrics at `/metrics`.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7070
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_identifier_kind() -> IdentifierKind {
    IdentifierKind::Phone
}

fn default_authentication_mode() -> AuthenticationMode {
    AuthenticationMode::YesSendUnknownCode
}

fn default_ledger_url() -> String {
    "http://127.0.0.1:7080".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./linkid_data")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_init_wait_secs() -> u64 {
    2
}

fn default_resync_interval_secs() -> u64 {
    12
}

fn default_code_ttl_secs() -> u64 {
    300
}

fn default_job_queue_capacity() -> usize {
    1024
}

fn default_max_job_attempts() -> u32 {
    3
}

fn default_finished_retention_secs() -> u64 {
    3600
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.tick_interval_ms == 0 {
            return Err(NodeError::Config("tick_interval_ms must be positive".into()));
        }
        if self.resync_interval_secs == 0 {
            return Err(NodeError::Config("resync_interval_secs must be positive".into()));
        }
        if self.job_queue_capacity == 0 {
            return Err(NodeError::Config("job_queue_capacity must be positive".into()));
        }
        if self.max_job_attempts == 0 {
            return Err(NodeError::Config("max_job_attempts must be positive".into()));
        }
        if self.authentication_mode.sends_code() && self.gateway.is_none() {
            return Err(NodeError::Config(
                "authentication mode sends codes but no [gateway] is configured".into(),
            ));
        }
        Ok(())
    }

    /// The endpoint other validators reach this node at.
    pub fn advertised_endpoint(&self, port: u16) -> String {
        let host = if self.external_host.is_empty() {
            &self.host
        } else {
            &self.external_host
        };
        format!("{}://{}:{}", self.protocol, host, port)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            external_host: String::new(),
            protocol: default_protocol(),
            validator_key: String::new(),
            identifier_kind: default_identifier_kind(),
            authentication_mode: AuthenticationMode::NoSendKnownCode,
            ledger_url: default_ledger_url(),
            data_dir: default_data_dir(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            tick_interval_ms: default_tick_interval_ms(),
            init_wait_secs: default_init_wait_secs(),
            resync_interval_secs: default_resync_interval_secs(),
            code_ttl_secs: default_code_ttl_secs(),
            job_queue_capacity: default_job_queue_capacity(),
            max_job_attempts: default_max_job_attempts(),
            finished_retention_secs: default_finished_retention_secs(),
            enable_metrics: false,
            gateway: None,
        }
    }
}
