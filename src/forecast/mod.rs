//! Forecast retrieval from an OpenWeatherMap-compatible 5-day/3-hour API.

#[cfg(feature = "test-utils")]
pub mod test_utils;

use crate::config::ForecastConfig;
use crate::core::{ForecastEntry, ForecastProvider};
use crate::error::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Wire format of the `/forecast` response. Only the fields the classifier
/// needs are decoded.
#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Option<Vec<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    dt_txt: String,
    main: RawMain,
    wind: RawWind,
    #[serde(default)]
    rain: Option<RawRain>,
    #[serde(default)]
    weather: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
struct RawMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct RawWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct RawRain {
    #[serde(rename = "3h", default)]
    three_hours: f64,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    main: String,
}

impl RawEntry {
    fn into_entry(self, city: &str) -> Result<ForecastEntry, FetchError> {
        let condition = self
            .weather
            .into_iter()
            .next()
            .map(|w| w.main)
            .ok_or_else(|| FetchError::Malformed {
                city: city.to_string(),
                reason: format!("entry {} has no weather condition", self.dt_txt),
            })?;

        Ok(ForecastEntry {
            timestamp: self.dt_txt,
            temperature_kelvin: self.main.temp,
            wind_speed_mps: self.wind.speed,
            precipitation_3h_mm: self.rain.map(|r| r.three_hours).unwrap_or_default(),
            condition,
        })
    }
}

/// HTTP client for the forecast endpoint.
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl OpenWeatherClient {
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build forecast HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }

    fn transport_error(&self, city: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                city: city.to_string(),
                after: self.timeout,
            }
        } else {
            FetchError::Transport {
                city: city.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl ForecastProvider for OpenWeatherClient {
    #[instrument(skip(self))]
    async fn fetch(&self, city: &str) -> Result<Vec<ForecastEntry>, FetchError> {
        let url = format!("{}/forecast", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| self.transport_error(city, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                city: city.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(city, e))?;
        let decoded: ForecastResponse =
            serde_json::from_slice(&body).map_err(|e| FetchError::Malformed {
                city: city.to_string(),
                reason: e.to_string(),
            })?;

        let raw_entries = decoded.list.ok_or_else(|| FetchError::MissingList {
            city: city.to_string(),
        })?;

        let entries = raw_entries
            .into_iter()
            .map(|raw| raw.into_entry(city))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = entries.len(), "Fetched forecast entries");
        Ok(entries)
    }
}
