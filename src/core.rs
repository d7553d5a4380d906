//! Core domain types and service traits for hazardwatch
//!
//! This module defines the data that flows through one scheduler tick and the
//! trait contracts of the two outbound collaborators: the forecast provider
//! and the notification backend.

use crate::error::{DeliveryError, FetchError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user who asked to be alerted about hazardous weather in a city.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscriber {
    /// Recipient address for alerts. Not validated.
    pub email: String,
    /// City name as understood by the forecast provider.
    pub city: String,
}

impl Subscriber {
    pub fn new(email: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            city: city.into(),
        }
    }
}

/// One 3-hour slot of a city forecast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastEntry {
    /// Provider-formatted slot time, e.g. `2024-05-01 15:00:00`.
    pub timestamp: String,
    pub temperature_kelvin: f64,
    pub wind_speed_mps: f64,
    /// Rain volume over the slot; zero when the provider omits it.
    pub precipitation_3h_mm: f64,
    /// Main condition label, e.g. `Rain`, `Thunderstorm`, `Snow`.
    pub condition: String,
}

/// A named weather-risk category attached to a forecast entry.
///
/// The declaration order is the canonical order used in alert bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HazardTag {
    Heatwave,
    ColdWave,
    StrongWind,
    HeavyRainfall,
    Storm,
    Snowfall,
}

impl HazardTag {
    /// Human-readable label used in alert bodies.
    pub fn label(&self) -> &'static str {
        match self {
            HazardTag::Heatwave => "🔥 Heatwave",
            HazardTag::ColdWave => "🥶 Cold wave",
            HazardTag::StrongWind => "💨 Strong wind",
            HazardTag::HeavyRainfall => "🌧 Heavy rainfall",
            HazardTag::Storm => "⛈ Storm",
            HazardTag::Snowfall => "❄ Snowfall",
        }
    }
}

impl fmt::Display for HazardTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The hazards found in one forecast entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastWarning {
    pub entry_timestamp: String,
    pub hazards: Vec<HazardTag>,
}

/// Markup of an alert body. Chosen by the active notification backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFormat {
    #[default]
    PlainText,
    Html,
}

/// A fully composed alert for one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub recipient: Subscriber,
    pub subject: String,
    pub body: String,
    pub format: BodyFormat,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Fetches multi-point forecasts for a city.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    /// Returns the forecast entries for `city` in provider order.
    ///
    /// # Returns
    /// * `Ok(entries)` on success, possibly empty
    /// * `Err(FetchError)` on transport, status or decoding failures
    async fn fetch(&self, city: &str) -> Result<Vec<ForecastEntry>, FetchError>;
}

/// Delivers a composed alert to its recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A short backend name (e.g. "smtp"), used in logs and metrics.
    fn name(&self) -> &str;

    /// The body markup this backend sends.
    fn body_format(&self) -> BodyFormat;

    /// Sends one message to one recipient.
    async fn send(&self, message: &AlertMessage) -> Result<(), DeliveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hazard_tags_sort_in_canonical_order() {
        let mut tags = vec![
            HazardTag::Snowfall,
            HazardTag::Heatwave,
            HazardTag::Storm,
            HazardTag::StrongWind,
        ];
        tags.sort();
        assert_eq!(
            tags,
            vec![
                HazardTag::Heatwave,
                HazardTag::StrongWind,
                HazardTag::Storm,
                HazardTag::Snowfall
            ]
        );
    }

    #[test]
    fn test_hazard_tag_display_uses_label() {
        assert_eq!(HazardTag::ColdWave.to_string(), "🥶 Cold wave");
        assert_eq!(HazardTag::HeavyRainfall.to_string(), "🌧 Heavy rainfall");
    }
}
