//! Alert delivery backends.
//!
//! Every backend implements [`Notifier`]; the one in use is chosen once at
//! startup from `notification.backend` and shared by the scheduler.

pub mod smtp;
pub mod transactional;

#[cfg(feature = "test-utils")]
pub mod test_utils;

use crate::config::{Backend, NotificationConfig};
use crate::core::Notifier;
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub use smtp::SmtpNotifier;
pub use transactional::TransactionalEmailNotifier;

/// Builds the notifier selected in the configuration.
pub fn build_notifier(config: &NotificationConfig) -> Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match config.backend {
        Backend::Smtp => Arc::new(SmtpNotifier::new(config)?),
        Backend::Transactional => Arc::new(TransactionalEmailNotifier::new(config)?),
    };
    info!(backend = notifier.name(), "Notification backend ready");
    Ok(notifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::BodyFormat;

    #[test]
    fn test_backend_selection_decides_body_format() {
        let mut config = Config::default().notification;
        config.sender_email = "alerts@example.com".to_string();
        config.smtp.password = "secret".to_string();
        config.transactional.api_key = "key".to_string();

        let smtp = build_notifier(&config).unwrap();
        assert_eq!(smtp.name(), "smtp");
        assert_eq!(smtp.body_format(), BodyFormat::PlainText);

        config.backend = Backend::Transactional;
        let api = build_notifier(&config).unwrap();
        assert_eq!(api.name(), "transactional");
        assert_eq!(api.body_format(), BodyFormat::Html);
    }
}
