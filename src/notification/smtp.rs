//! Alert delivery through an authenticated SMTP relay.

use crate::config::{NotificationConfig, SmtpConfig};
use crate::core::{AlertMessage, BodyFormat, Notifier};
use crate::error::DeliveryError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;
use tokio::task;
use tracing::{error, info, instrument};

/// Sends plain-text alerts over SMTP with STARTTLS.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl SmtpNotifier {
    /// Builds the relay transport. No connection is opened until the first send.
    pub fn new(config: &NotificationConfig) -> Result<Self> {
        let sender = sender_mailbox(&config.sender_name, &config.sender_email)
            .context("invalid sender address")?;
        let transport = build_transport(&config.smtp, &config.sender_email)?;
        Ok(Self { transport, sender })
    }

    /// Builds the MIME message for one alert.
    pub fn build_message(&self, message: &AlertMessage) -> Result<Message, DeliveryError> {
        let recipient: Mailbox =
            message
                .recipient
                .email
                .parse()
                .map_err(|e: lettre::address::AddressError| DeliveryError::Address {
                    address: message.recipient.email.clone(),
                    reason: e.to_string(),
                })?;

        let content_type = match message.format {
            BodyFormat::PlainText => ContentType::TEXT_PLAIN,
            BodyFormat::Html => ContentType::TEXT_HTML,
        };

        let email = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(message.subject.clone())
            .header(content_type)
            .body(message.body.clone())?;
        Ok(email)
    }
}

fn sender_mailbox(name: &str, email: &str) -> Result<Mailbox, DeliveryError> {
    let address = email.parse().map_err(|e: lettre::address::AddressError| {
        DeliveryError::Address {
            address: email.to_string(),
            reason: e.to_string(),
        }
    })?;
    let name = if name.trim().is_empty() {
        None
    } else {
        Some(name.to_string())
    };
    Ok(Mailbox::new(name, address))
}

fn build_transport(config: &SmtpConfig, sender_email: &str) -> Result<SmtpTransport> {
    let username = config
        .username
        .clone()
        .unwrap_or_else(|| sender_email.to_string());
    let credentials = Credentials::new(username, config.password.clone());

    let transport = SmtpTransport::starttls_relay(&config.host)
        .with_context(|| format!("failed to configure SMTP relay {}", config.host))?
        .port(config.port)
        .credentials(credentials)
        .timeout(Some(Duration::from_secs(config.timeout_secs)))
        .build();
    Ok(transport)
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    fn body_format(&self) -> BodyFormat {
        BodyFormat::PlainText
    }

    #[instrument(skip(self, message), fields(recipient = %message.recipient.email))]
    async fn send(&self, message: &AlertMessage) -> Result<(), DeliveryError> {
        let email = self.build_message(message)?;

        // The lettre transport is blocking; keep it off the async workers.
        let transport = self.transport.clone();
        let result = task::spawn_blocking(move || transport.send(&email)).await;

        match result {
            Ok(Ok(response)) => {
                info!(code = %response.code(), "Alert sent over SMTP");
                Ok(())
            }
            Ok(Err(e)) => {
                error!(error = %e, "SMTP delivery failed");
                Err(e.into())
            }
            Err(e) => {
                error!(error = %e, "SMTP delivery task failed");
                Err(DeliveryError::Task(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::Subscriber;

    fn notifier() -> SmtpNotifier {
        let mut config = Config::default().notification;
        config.sender_email = "alerts@example.com".to_string();
        config.smtp.password = "secret".to_string();
        SmtpNotifier::new(&config).unwrap()
    }

    fn alert(email: &str) -> AlertMessage {
        AlertMessage {
            recipient: Subscriber::new(email, "Delhi"),
            subject: "⚠ Harsh Weather Alert!".to_string(),
            body: "2024-05-01 12:00:00: 🔥 Heatwave".to_string(),
            format: BodyFormat::PlainText,
        }
    }

    #[test]
    fn test_build_message_sets_headers() {
        let email = notifier().build_message(&alert("farmer@example.com")).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("Crop Advisory System"));
        assert!(raw.contains("<alerts@example.com>"));
        assert!(raw.contains("To: farmer@example.com"));
        assert!(raw.contains("Content-Type: text/plain; charset=utf-8"));
        assert_eq!(email.envelope().to().len(), 1);
    }

    #[test]
    fn test_invalid_recipient_is_rejected_before_sending() {
        let err = notifier().build_message(&alert("not-an-address")).unwrap_err();
        assert!(
            matches!(err, DeliveryError::Address { ref address, .. } if address == "not-an-address")
        );
    }

    #[test]
    fn test_invalid_sender_fails_construction() {
        let mut config = Config::default().notification;
        config.sender_email = "broken".to_string();
        config.smtp.password = "secret".to_string();
        assert!(SmtpNotifier::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_send() {
        let notifier = notifier();
        assert_eq!(notifier.body_format(), BodyFormat::PlainText);
        let result = notifier.send(&alert("@@")).await;
        assert!(matches!(result, Err(DeliveryError::Address { .. })));
    }
}
