//! Typed failures for the monitoring pipeline.
//!
//! Each error kind maps to one recovery policy: configuration errors stop the
//! process at startup, fetch and delivery errors only skip the affected
//! subscriber for the current tick.

use std::time::Duration;
use thiserror::Error;

/// A required setting is missing or out of range. Fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// The forecast for one city could not be obtained.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("forecast request for {city} failed: {source}")]
    Transport {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("forecast provider answered {status} for {city}")]
    Status {
        city: String,
        status: reqwest::StatusCode,
    },

    #[error("forecast response for {city} has no `list` field")]
    MissingList { city: String },

    #[error("malformed forecast response for {city}: {reason}")]
    Malformed { city: String, reason: String },

    #[error("forecast request for {city} timed out after {after:?}")]
    Timeout { city: String, after: Duration },
}

impl FetchError {
    /// The city whose forecast failed.
    pub fn city(&self) -> &str {
        match self {
            FetchError::Transport { city, .. }
            | FetchError::Status { city, .. }
            | FetchError::MissingList { city }
            | FetchError::Malformed { city, .. }
            | FetchError::Timeout { city, .. } => city,
        }
    }
}

/// An alert could not be handed to the delivery backend.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid email address `{address}`: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build email message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("email API request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("email API rejected the message with {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    #[error("delivery task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_reports_city() {
        let err = FetchError::MissingList {
            city: "Delhi".to_string(),
        };
        assert_eq!(err.city(), "Delhi");
        assert!(err.to_string().contains("no `list` field"));

        let err = FetchError::Timeout {
            city: "Pune".to_string(),
            after: Duration::from_secs(10),
        };
        assert_eq!(err.city(), "Pune");
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::Missing("forecast.api_key");
        assert_eq!(err.to_string(), "missing required setting `forecast.api_key`");

        let err = ConfigError::Invalid {
            key: "scheduler.concurrency",
            reason: "must be at least 1".to_string(),
        };
        assert!(err.to_string().contains("scheduler.concurrency"));
    }
}
