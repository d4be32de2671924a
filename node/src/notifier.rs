//! Delivery of verification codes to users.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{AuthenticationMode, GatewayConfig};

const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Chosen once from configuration and injected into the worker.
#[derive(Clone)]
pub enum Notifier {
    Gateway(GatewaySender),
    NoOp,
}

impl Notifier {
    pub fn from_config(
        mode: AuthenticationMode,
        gateway: Option<&GatewayConfig>,
        code_ttl_secs: u64,
    ) -> Self {
        match gateway {
            Some(config) if mode.sends_code() => {
                Notifier::Gateway(GatewaySender::new(config.clone(), code_ttl_secs))
            }
            _ => Notifier::NoOp,
        }
    }

    /// Deliver `code`; `index` is this validator's position among `total`.
    pub async fn send(&self, index: u32, total: usize, code: &str, recipient: &str) -> bool {
        match self {
            Notifier::Gateway(sender) => sender.send(index, total, code, recipient).await,
            Notifier::NoOp => {
                debug!(index, "no-op notifier, code not delivered");
                true
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GatewayMessage<'a> {
    access_key: &'a str,
    sender: &'a str,
    receiver: &'a str,
    msg: String,
}

#[derive(Clone)]
pub struct GatewaySender {
    http_client: reqwest::Client,
    config: GatewayConfig,
    code_ttl_secs: u64,
}

impl GatewaySender {
    pub fn new(config: GatewayConfig, code_ttl_secs: u64) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            config,
            code_ttl_secs,
        }
    }

    pub fn message(&self, index: u32, total: usize, code: &str) -> String {
        format!(
            "Verification code [{}/{}]: {}. Valid for {} minutes.",
            index + 1,
            total,
            code,
            (self.code_ttl_secs / 60).max(1)
        )
    }

    pub async fn send(&self, index: u32, total: usize, code: &str, recipient: &str) -> bool {
        let body = GatewayMessage {
            access_key: &self.config.access_key,
            sender: &self.config.sender,
            receiver: recipient,
            msg: self.message(index, total, code),
        };
        match self
            .http_client
            .post(&self.config.endpoint)
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(status = %response.status(), "gateway refused message");
                false
            }
            Err(e) => {
                warn!(error = %e, "gateway unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> GatewayConfig {
        GatewayConfig {
            endpoint: "http://127.0.0.1:1/send".into(),
            access_key: "key".into(),
            sender: "0100000000".into(),
        }
    }

    #[test]
    fn message_numbers_validators_from_one() {
        let sender = GatewaySender::new(gateway(), 300);
        assert_eq!(
            sender.message(0, 3, "42"),
            "Verification code [1/3]: 42. Valid for 5 minutes."
        );
    }

    #[test]
    fn silent_modes_get_no_op() {
        let notifier = Notifier::from_config(
            AuthenticationMode::NoSendKnownCode,
            Some(&gateway()),
            300,
        );
        assert!(matches!(notifier, Notifier::NoOp));
        let notifier = Notifier::from_config(
            AuthenticationMode::YesSendKnownCode,
            Some(&gateway()),
            300,
        );
        assert!(matches!(notifier, Notifier::Gateway(_)));
    }

    #[tokio::test]
    async fn unreachable_gateway_reports_failure() {
        let notifier = Notifier::Gateway(GatewaySender::new(gateway(), 300));
        assert!(!notifier.send(0, 1, "00", "01012341000").await);
        assert!(Notifier::NoOp.send(0, 1, "00", "01012341000").await);
    }
}
