//! hazardwatch - weather hazard monitoring with email alerts
//!
//! Subscribers register a city through the HTTP API. A scheduler polls the
//! forecast for every subscription, classifies each forecast slot against
//! fixed hazard thresholds and emails an alert through the configured
//! backend when anything hazardous is ahead.

pub mod api;
pub mod app;
pub mod classifier;
pub mod cli;
pub mod composer;
pub mod config;
pub mod core;
pub mod error;
pub mod forecast;
pub mod internal_metrics;
pub mod notification;
pub mod registry;
pub mod scheduler;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
pub use crate::error::{ConfigError, DeliveryError, FetchError};
