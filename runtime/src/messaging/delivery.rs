// Copyright 2026 Pagewright Contributors
// SPDX-License-Identifier: Apache-2.0

//! Retrying delivery of a single message.

use super::gateway::{GatewayError, MessageGateway, OutboundMessage};
use crate::events::{EventBus, RunEvent};
use pagewright::{retry_with_backoff_if, RetryPolicy};
use serde::Serialize;
use std::time::Duration;

/// Result of delivering one message, after retries.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub to: String,
    pub success: bool,
    pub attempts: u32,
    pub message_id: Option<String>,
    pub provider_status: Option<String>,
    pub error: Option<String>,
    #[serde(skip)]
    pub delays: Vec<Duration>,
}

/// Send `message`, retrying transient gateway failures under `policy`.
pub async fn deliver(
    gateway: &dyn MessageGateway,
    message: &OutboundMessage,
    policy: &RetryPolicy,
    bus: &EventBus,
) -> DeliveryReport {
    let result = retry_with_backoff_if(
        policy,
        |attempt| {
            tracing::debug!(to = %message.to, attempt, "sending message");
            gateway.send(message)
        },
        GatewayError::is_retryable,
    )
    .await;

    let report = match result {
        Ok(done) => DeliveryReport {
            to: message.to.clone(),
            success: true,
            attempts: done.attempts,
            message_id: Some(done.value.id),
            provider_status: done.value.status,
            error: None,
            delays: done.delays,
        },
        Err(exhausted) => DeliveryReport {
            to: message.to.clone(),
            success: false,
            attempts: exhausted.attempts,
            message_id: None,
            provider_status: None,
            error: Some(exhausted.last_error.to_string()),
            delays: exhausted.delays,
        },
    };

    if report.success {
        tracing::info!(to = %report.to, attempts = report.attempts, "message delivered");
    } else {
        tracing::warn!(
            to = %report.to,
            attempts = report.attempts,
            error = report.error.as_deref().unwrap_or_default(),
            "message delivery failed"
        );
    }
    bus.emit(RunEvent::DeliveryComplete {
        to: report.to.clone(),
        success: report.success,
        attempts: report.attempts,
        message_id: report.message_id.clone(),
        error: report.error.clone(),
    });
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::gateway::MessageReceipt;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Gateway that replays a fixed script of results.
    struct ScriptedGateway {
        script: Mutex<Vec<Result<MessageReceipt, GatewayError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedGateway {
        fn new(mut script: Vec<Result<MessageReceipt, GatewayError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl MessageGateway for ScriptedGateway {
        async fn send(&self, _message: &OutboundMessage) -> Result<MessageReceipt, GatewayError> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(GatewayError::Malformed("script exhausted".to_string())))
        }
    }

    fn server_error() -> Result<MessageReceipt, GatewayError> {
        Err(GatewayError::Rejected {
            status: 503,
            code: None,
            message: "unavailable".to_string(),
        })
    }

    fn message() -> OutboundMessage {
        OutboundMessage {
            from: "+15550001111".to_string(),
            to: "+12125551234".to_string(),
            body: "hello".to_string(),
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_success() {
        let gateway = ScriptedGateway::new(vec![
            server_error(),
            server_error(),
            Ok(MessageReceipt {
                id: "SM9".to_string(),
                status: Some("queued".to_string()),
            }),
        ]);
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let report = deliver(&gateway, &message(), &policy(), &bus).await;

        assert!(report.success);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.message_id.as_deref(), Some("SM9"));
        assert_eq!(*gateway.calls.lock().unwrap(), 3);
        assert!(report.delays[0] < report.delays[1]);
        assert!(matches!(
            rx.try_recv().unwrap(),
            RunEvent::DeliveryComplete { success: true, attempts: 3, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_reports_last_error() {
        let gateway = ScriptedGateway::new(vec![server_error(), server_error(), server_error()]);
        let report = deliver(&gateway, &message(), &policy(), &EventBus::default()).await;
        assert!(!report.success);
        assert_eq!(report.attempts, 3);
        assert!(report.error.unwrap().contains("HTTP 503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_is_not_retried() {
        let gateway = ScriptedGateway::new(vec![Err(GatewayError::Rejected {
            status: 400,
            code: Some(21211),
            message: "invalid To".to_string(),
        })]);
        let report = deliver(&gateway, &message(), &policy(), &EventBus::default()).await;
        assert!(!report.success);
        assert_eq!(report.attempts, 1);
        assert_eq!(*gateway.calls.lock().unwrap(), 1);
    }
}
