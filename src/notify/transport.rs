//! Messaging port and its transports.
//!
//! The dispatcher talks to any [`Messenger`]. Two transports ship with the
//! agent: a Twilio-compatible SMS REST gateway and a dry-run transport that
//! only logs.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Environment variables holding the SMS gateway credentials.
pub const ENV_ACCOUNT_SID: &str = "GLOF_SMS_ACCOUNT_SID";
pub const ENV_AUTH_TOKEN: &str = "GLOF_SMS_AUTH_TOKEN";
pub const ENV_FROM: &str = "GLOF_SMS_FROM";
pub const ENV_TO: &str = "GLOF_SMS_TO";
pub const ENV_API_BASE: &str = "GLOF_SMS_API_BASE";

/// Default REST endpoint for the SMS gateway.
pub const DEFAULT_API_BASE: &str = "https://api.twilio.com";

/// Acknowledgement from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub message_id: String,
}

/// Transport-level errors.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// Response body could not be parsed
    Serialization(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Network(msg) => write!(f, "SMS network error: {msg}"),
            TransportError::Server { status, message } => {
                write!(f, "SMS gateway error ({status}): {message}")
            }
            TransportError::Serialization(msg) => write!(f, "SMS response error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Outbound messaging port.
pub trait Messenger: Send + Sync {
    fn send(
        &self,
        to: &str,
        body: &str,
    ) -> impl Future<Output = Result<Ack, TransportError>> + Send;
}

/// SMS gateway credentials and identities. Never hardcoded.
#[derive(Clone)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
    pub to: String,
    pub api_base: String,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl SmsConfig {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through `lookup`. Missing or blank values are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingCredential(key.to_string()))
        };

        Ok(Self {
            account_sid: required(ENV_ACCOUNT_SID)?,
            auth_token: required(ENV_AUTH_TOKEN)?,
            from: required(ENV_FROM)?,
            to: required(ENV_TO)?,
            api_base: lookup(ENV_API_BASE)
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    /// Message-creation endpoint.
    pub fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

/// Message resource returned by the gateway.
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

/// SMS delivery over the gateway's REST API.
pub struct SmsGateway {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsGateway {
    pub fn new(config: SmsConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("glof-monitor/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SmsConfig {
        &self.config
    }
}

impl Messenger for SmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<Ack, TransportError> {
        let response = self
            .client
            .post(self.config.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[("To", to), ("From", self.config.from.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let resource: MessageResource = response
            .json()
            .await
            .map_err(|e| TransportError::Serialization(e.to_string()))?;

        Ok(Ack {
            message_id: resource.sid,
        })
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct DryRunMessenger;

impl Messenger for DryRunMessenger {
    async fn send(&self, to: &str, body: &str) -> Result<Ack, TransportError> {
        tracing::info!(recipient = to, "dry-run notification:\n{}", body);
        Ok(Ack {
            message_id: format!("dry-run-{}", &uuid::Uuid::new_v4().to_string()[..8]),
        })
    }
}

/// Transport chosen at startup.
pub enum Transport {
    Sms(SmsGateway),
    DryRun(DryRunMessenger),
}

impl Transport {
    pub fn name(&self) -> &'static str {
        match self {
            Transport::Sms(_) => "sms",
            Transport::DryRun(_) => "dry-run",
        }
    }
}

impl Messenger for Transport {
    async fn send(&self, to: &str, body: &str) -> Result<Ack, TransportError> {
        match self {
            Transport::Sms(gateway) => gateway.send(to, body).await,
            Transport::DryRun(dry_run) => dry_run.send(to, body).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_sms_config_from_lookup() {
        let config = SmsConfig::from_lookup(lookup(&[
            (ENV_ACCOUNT_SID, "AC123"),
            (ENV_AUTH_TOKEN, "secret"),
            (ENV_FROM, "+15550001111"),
            (ENV_TO, "+9779800000000"),
        ]))
        .unwrap();

        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(
            config.messages_url(),
            "https://api.twilio.com/2010-04-01/Accounts/AC123/Messages.json"
        );
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn test_missing_credential_is_config_error() {
        let err = SmsConfig::from_lookup(lookup(&[
            (ENV_ACCOUNT_SID, "AC123"),
            (ENV_FROM, "+15550001111"),
            (ENV_TO, "+9779800000000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ref key) if key == ENV_AUTH_TOKEN));
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let err = SmsConfig::from_lookup(lookup(&[
            (ENV_ACCOUNT_SID, "AC123"),
            (ENV_AUTH_TOKEN, "secret"),
            (ENV_FROM, "   "),
            (ENV_TO, "+9779800000000"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(ref key) if key == ENV_FROM));
    }

    #[test]
    fn test_api_base_override_trims_slash() {
        let config = SmsConfig::from_lookup(lookup(&[
            (ENV_ACCOUNT_SID, "AC1"),
            (ENV_AUTH_TOKEN, "t"),
            (ENV_FROM, "a"),
            (ENV_TO, "b"),
            (ENV_API_BASE, "http://127.0.0.1:9999/"),
        ]))
        .unwrap();
        assert_eq!(
            config.messages_url(),
            "http://127.0.0.1:9999/2010-04-01/Accounts/AC1/Messages.json"
        );
    }

    #[tokio::test]
    async fn test_dry_run_acknowledges() {
        let ack = DryRunMessenger.send("+1555", "hello").await.unwrap();
        assert!(ack.message_id.starts_with("dry-run-"));
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_network_error() {
        let config = SmsConfig {
            account_sid: "AC1".to_string(),
            auth_token: "t".to_string(),
            from: "a".to_string(),
            to: "b".to_string(),
            // Port 9 (discard) on localhost is not expected to serve HTTP.
            api_base: "http://127.0.0.1:9".to_string(),
        };
        let gateway = SmsGateway::new(config).unwrap();
        let err = gateway.send("b", "body").await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }
}
