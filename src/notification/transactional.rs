//! A client for a Brevo-style transactional email API.

use crate::config::NotificationConfig;
use crate::core::{AlertMessage, BodyFormat, Notifier};
use crate::error::DeliveryError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info, instrument};

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(rename = "messageId")]
    message_id: Option<String>,
}

/// Sends HTML alerts through an HTTP email API authenticated by an `api-key` header.
pub struct TransactionalEmailNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender_name: String,
    sender_email: String,
    timeout: Duration,
}

impl TransactionalEmailNotifier {
    /// Creates a new `TransactionalEmailNotifier`.
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.transactional.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build email API client")?;

        Ok(Self {
            client,
            api_url: config.transactional.api_url.clone(),
            api_key: config.transactional.api_key.clone(),
            sender_name: config.sender_name.clone(),
            sender_email: config.sender_email.clone(),
            timeout,
        })
    }

    fn payload(&self, message: &AlertMessage) -> Value {
        json!({
            "sender": { "name": self.sender_name, "email": self.sender_email },
            "to": [{ "email": message.recipient.email }],
            "subject": message.subject,
            "htmlContent": message.body,
        })
    }
}

#[async_trait]
impl Notifier for TransactionalEmailNotifier {
    fn name(&self) -> &str {
        "transactional"
    }

    fn body_format(&self) -> BodyFormat {
        BodyFormat::Html
    }

    #[instrument(skip(self, message), fields(recipient = %message.recipient.email))]
    async fn send(&self, message: &AlertMessage) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .json(&self.payload(message))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request to email API failed");
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout)
                } else {
                    DeliveryError::Transport(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Email API rejected the alert");
            return Err(DeliveryError::Rejected { status, body });
        }

        // The message id is informational; an unexpected body is not a failure.
        let message_id = response
            .json::<SendResponse>()
            .await
            .ok()
            .and_then(|r| r.message_id)
            .unwrap_or_default();
        info!(message_id = %message_id, "Alert accepted by email API");
        Ok(())
    }
}
