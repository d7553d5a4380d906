//! Command-Line Interface (CLI) argument parsing.
//!
//! Arguments parsed here are merged last on top of the configuration file and
//! environment variables, so any flag given on the command line wins.

use crate::config::Backend;
use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Polls weather forecasts for subscribed cities and emails hazard alerts.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address for the subscribe/health API, e.g. 0.0.0.0:8000.
    #[arg(long, value_name = "ADDR")]
    pub listen_addr: Option<String>,

    /// Seconds between two forecast checks.
    #[arg(long, value_name = "SECONDS")]
    pub poll_interval_secs: Option<u64>,

    /// Maximum number of subscribers processed concurrently during a check.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Alert delivery backend.
    #[arg(long, value_enum)]
    pub backend: Option<CliBackend>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Run a forecast check as soon as the service starts.
    #[arg(long)]
    pub run_immediately: bool,
}

/// Backend names accepted on the command line.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliBackend {
    Smtp,
    Transactional,
}

impl From<CliBackend> for Backend {
    fn from(value: CliBackend) -> Self {
        match value {
            CliBackend::Smtp => Backend::Smtp,
            CliBackend::Transactional => Backend::Transactional,
        }
    }
}

/// Inserts `value` under a dotted key path, creating nested tables as needed.
fn insert_path(dict: &mut Dict, path: &str, value: Value) {
    match path.split_once('.') {
        Some((head, rest)) => {
            let entry = dict
                .entry(head.to_string())
                .or_insert_with(|| Value::from(Dict::new()));
            if let Value::Dict(_, nested) = entry {
                insert_path(nested, rest, value);
            }
        }
        None => {
            dict.insert(path.to_string(), value);
        }
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(addr) = &self.listen_addr {
            insert_path(&mut dict, "server.listen_addr", Value::from(addr.clone()));
        }

        if let Some(interval) = self.poll_interval_secs {
            insert_path(
                &mut dict,
                "scheduler.poll_interval_secs",
                Value::from(interval),
            );
        }

        if let Some(concurrency) = self.concurrency {
            insert_path(&mut dict, "scheduler.concurrency", Value::from(concurrency));
        }

        if let Some(backend) = self.backend {
            insert_path(
                &mut dict,
                "notification.backend",
                Value::from(Backend::from(backend).to_string()),
            );
        }

        if let Some(level) = &self.log_level {
            insert_path(&mut dict, "log_level", Value::from(level.clone()));
        }

        // Only an explicit flag overrides the file; absence keeps its value.
        if self.run_immediately {
            insert_path(&mut dict, "scheduler.run_immediately", Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
