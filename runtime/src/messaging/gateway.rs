// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Outbound SMS gateway.

use crate::config::MessagingConfig;
use async_trait::async_trait;
use pagewright::ErrorKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One message to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub body: String,
}

/// What the provider returned for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub id: String,
    pub status: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("messaging gateway not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected message (HTTP {status}): {message}")]
    Rejected {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Transport failures, throttling and server errors are worth retrying;
    /// a rejected request will be rejected again.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport(_) => true,
            GatewayError::Rejected { status, .. } => *status == 429 || *status >= 500,
            GatewayError::NotConfigured(_) | GatewayError::Malformed(_) => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NotConfigured(_) => ErrorKind::InvalidInput,
            GatewayError::Rejected { status, .. }
                if (400..500).contains(status) && *status != 429 =>
            {
                ErrorKind::InvalidInput
            }
            _ => ErrorKind::TransientRemote,
        }
    }
}

/// Anything that can deliver a text message.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<MessageReceipt, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioError {
    code: Option<i64>,
    message: Option<String>,
}

/// Twilio Messages API over HTTPS with basic auth.
#[derive(Clone)]
pub struct TwilioGateway {
    client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
}

impl TwilioGateway {
    pub fn new(
        api_base: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        }
    }

    pub fn from_config(config: &MessagingConfig) -> Result<Self, GatewayError> {
        let sid = config
            .account_sid
            .as_deref()
            .ok_or(GatewayError::NotConfigured("TWILIO_ACCOUNT_SID"))?;
        let token = config
            .auth_token
            .as_deref()
            .ok_or(GatewayError::NotConfigured("TWILIO_AUTH_TOKEN"))?;
        Ok(Self::new(
            config.api_base.clone(),
            sid,
            token,
            Duration::from_millis(config.request_timeout_ms),
        ))
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

#[async_trait]
impl MessageGateway for TwilioGateway {
    async fn send(&self, message: &OutboundMessage) -> Result<MessageReceipt, GatewayError> {
        let form = [
            ("From", message.from.as_str()),
            ("To", message.to.as_str()),
            ("Body", message.body.as_str()),
        ];
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let parsed: Option<TwilioError> = serde_json::from_str(&body).ok();
            let (code, text) = match parsed {
                Some(e) => (e.code, e.message),
                None => (None, None),
            };
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                code,
                message: text.unwrap_or(body),
            });
        }

        let parsed: TwilioMessage =
            serde_json::from_str(&body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let id = parsed
            .sid
            .ok_or_else(|| GatewayError::Malformed("response has no sid".to_string()))?;
        Ok(MessageReceipt {
            id,
            status: parsed.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn message() -> OutboundMessage {
        OutboundMessage {
            from: "+15550001111".to_string(),
            to: "+12125551234".to_string(),
            body: "Hi Ana".to_string(),
        }
    }

    fn gateway(server: &MockServer) -> TwilioGateway {
        TwilioGateway::new(server.uri(), "AC123", "secret", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_send_posts_form_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC123/Messages.json"))
            .and(header_exists("authorization"))
            .and(body_string_contains("To=%2B12125551234"))
            .and(body_string_contains("Body=Hi+Ana"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"sid": "SM123", "status": "queued"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let receipt = gateway(&server).send(&message()).await.unwrap();
        assert_eq!(receipt.id, "SM123");
        assert_eq!(receipt.status.as_deref(), Some("queued"));
    }

    #[tokio::test]
    async fn test_rejection_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "code": 21211,
                "message": "The 'To' number is not a valid phone number.",
                "status": 400
            })))
            .mount(&server)
            .await;

        let err = gateway(&server).send(&message()).await.unwrap_err();
        match &err {
            GatewayError::Rejected { status, code, message } => {
                assert_eq!(*status, 400);
                assert_eq!(*code, Some(21211));
                assert!(message.contains("not a valid phone number"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = gateway(&server).send(&message()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::TransientRemote);
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = MessagingConfig::default();
        assert!(matches!(
            TwilioGateway::from_config(&config),
            Err(GatewayError::NotConfigured("TWILIO_ACCOUNT_SID"))
        ));
    }
}
