use crate::core::{AlertMessage, BodyFormat, Notifier};
use crate::error::DeliveryError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Notifier that records every alert instead of delivering it.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<AlertMessage>>>,
    failing_recipients: Arc<Mutex<HashSet<String>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    format: BodyFormat,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(format: BodyFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Make every send to `email` fail.
    pub fn fail_for(&self, email: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(email.to_string());
    }

    /// Make every send take `delay` before completing.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Messages successfully "delivered" so far, in completion order.
    pub fn sent(&self) -> Vec<AlertMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, email: &str) -> Vec<AlertMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.recipient.email == email)
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn body_format(&self) -> BodyFormat {
        self.format
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), DeliveryError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self
            .failing_recipients
            .lock()
            .unwrap()
            .contains(&message.recipient.email)
        {
            return Err(DeliveryError::Address {
                address: message.recipient.email.clone(),
                reason: "rejected by test notifier".to_string(),
            });
        }

        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
