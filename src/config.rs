//! Configuration management for hazardwatch
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, an optional TOML file,
//! `HAZARDWATCH_` environment variables, the unprefixed variable names used by
//! earlier deployments and finally command-line arguments.

use crate::cli::Cli;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default configuration file, read from the working directory if present.
pub const DEFAULT_CONFIG_FILE: &str = "hazardwatch.toml";

/// Legacy environment variables and the settings they populate.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("OPENWEATHER_KEY", "forecast.api_key"),
    ("EMAIL_SENDER", "notification.sender_email"),
    ("EMAIL_PASSWORD", "notification.smtp.password"),
    ("BREVO_API_KEY", "notification.transactional.api_key"),
    ("BREVO_SENDER", "notification.sender_email"),
    ("BREVO_NAME", "notification.sender_name"),
];

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level, overridden by `RUST_LOG` when set.
    pub log_level: String,
    pub server: ServerConfig,
    pub forecast: ForecastConfig,
    pub scheduler: SchedulerConfig,
    pub notification: NotificationConfig,
    pub alert: AlertConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// HTTP API settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address the subscribe/health API binds to.
    pub listen_addr: String,
}

/// Forecast provider settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Base URL of the OpenWeatherMap-compatible API.
    pub base_url: String,
    /// Provider API key (`appid`).
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Polling and fan-out settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Time between two ticks.
    pub poll_interval_secs: u64,
    /// Maximum number of subscriber pipelines in flight during a tick.
    pub concurrency: usize,
    /// Upper bound for one forecast fetch.
    pub fetch_timeout_secs: u64,
    /// Upper bound for one alert dispatch.
    pub dispatch_timeout_secs: u64,
    /// How long an in-flight tick may keep running after shutdown is requested.
    pub shutdown_grace_secs: u64,
    /// Run the first tick at startup instead of one interval later.
    #[serde(default)]
    pub run_immediately: bool,
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// The delivery backend used for alerts.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Smtp,
    Transactional,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Smtp => write!(f, "smtp"),
            Backend::Transactional => write!(f, "transactional"),
        }
    }
}

/// Notification delivery settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NotificationConfig {
    pub backend: Backend,
    /// Display name of the sender.
    pub sender_name: String,
    /// Sender address; also the SMTP login unless `smtp.username` is set.
    #[serde(default)]
    pub sender_email: String,
    pub smtp: SmtpConfig,
    pub transactional: TransactionalConfig,
}

/// SMTP relay settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: String,
    pub timeout_secs: u64,
}

/// Transactional email API settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TransactionalConfig {
    pub api_url: String,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: String,
    pub timeout_secs: u64,
}

/// Alert wording.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AlertConfig {
    pub subject: String,
    /// Name used in the sign-off line.
    pub signature: String,
}

/// Prometheus exporter settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MetricsConfig {
    /// Serve `/metrics` on the API listener.
    pub enabled: bool,
}

/// Reads a credential as a string even when the environment provider has
/// parsed it as a number or boolean.
fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct SecretVisitor;

    impl<'de> Visitor<'de> for SecretVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(SecretVisitor)
}

impl Config {
    /// Loads the application configuration.
    ///
    /// The file named by `--config` must exist; without it the default file is
    /// read only when present.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = match &cli.config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("configuration file not found: {}", path.display());
                }
                path.clone()
            }
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            // e.g. HAZARDWATCH_SCHEDULER__POLL_INTERVAL_SECS=3600
            .merge(Env::prefixed("HAZARDWATCH_").split("__"));

        for (variable, key) in LEGACY_ENV {
            figment = figment.merge(Env::raw().only(&[*variable]).map(move |_| (*key).into()));
        }

        let config: Config = figment
            .merge(cli)
            .extract()
            .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
        Ok(config)
    }

    /// Checks that every credential the selected backend needs is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forecast.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("forecast.api_key"));
        }
        if self.notification.sender_email.trim().is_empty() {
            return Err(ConfigError::Missing("notification.sender_email"));
        }
        match self.notification.backend {
            Backend::Smtp => {
                if self.notification.smtp.password.is_empty() {
                    return Err(ConfigError::Missing("notification.smtp.password"));
                }
                if self.notification.smtp.host.trim().is_empty() {
                    return Err(ConfigError::Missing("notification.smtp.host"));
                }
            }
            Backend::Transactional => {
                if self.notification.transactional.api_key.trim().is_empty() {
                    return Err(ConfigError::Missing("notification.transactional.api_key"));
                }
            }
        }
        if self.scheduler.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "scheduler.poll_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.scheduler.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "scheduler.concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                listen_addr: "0.0.0.0:8000".to_string(),
            },
            forecast: ForecastConfig {
                base_url: "https://api.openweathermap.org/data/2.5".to_string(),
                api_key: String::new(),
                timeout_secs: 10,
            },
            scheduler: SchedulerConfig {
                poll_interval_secs: 24 * 60 * 60,
                concurrency: 10,
                fetch_timeout_secs: 10,
                dispatch_timeout_secs: 30,
                shutdown_grace_secs: 30,
                run_immediately: false,
            },
            notification: NotificationConfig {
                backend: Backend::Smtp,
                sender_name: "Crop Advisory System".to_string(),
                sender_email: String::new(),
                smtp: SmtpConfig {
                    host: "smtp.gmail.com".to_string(),
                    port: 587,
                    username: None,
                    password: String::new(),
                    timeout_secs: 30,
                },
                transactional: TransactionalConfig {
                    api_url: "https://api.brevo.com/v3/smtp/email".to_string(),
                    api_key: String::new(),
                    timeout_secs: 30,
                },
            },
            alert: AlertConfig {
                subject: "⚠ Harsh Weather Alert!".to_string(),
                signature: "Crop Advisory System".to_string(),
            },
            metrics: MetricsConfig::default(),
        }
    }
}
