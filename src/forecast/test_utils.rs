use crate::core::{ForecastEntry, ForecastProvider};
use crate::error::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum Scripted {
    Forecast(Vec<ForecastEntry>),
    Failure(String),
}

/// Fake forecast provider for testing.
///
/// Each city answers with the same scripted response on every call. Cities
/// without a script fail, which mirrors an unknown city at the provider.
#[derive(Clone, Default)]
pub struct FakeForecastProvider {
    responses: Arc<Mutex<HashMap<String, Scripted>>>,
    call_count: Arc<Mutex<HashMap<String, u32>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeForecastProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every fetch for `city` with `entries`.
    pub fn set_forecast(&self, city: &str, entries: Vec<ForecastEntry>) {
        self.responses
            .lock()
            .unwrap()
            .insert(city.to_string(), Scripted::Forecast(entries));
    }

    /// Fail every fetch for `city`.
    pub fn set_failure(&self, city: &str, reason: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(city.to_string(), Scripted::Failure(reason.to_string()));
    }

    /// Make every fetch take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Get the number of times a city was fetched
    pub fn get_call_count(&self, city: &str) -> u32 {
        self.call_count
            .lock()
            .unwrap()
            .get(city)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.call_count.lock().unwrap().values().sum()
    }

    /// Highest number of fetches observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ForecastProvider for FakeForecastProvider {
    async fn fetch(&self, city: &str) -> Result<Vec<ForecastEntry>, FetchError> {
        {
            let mut call_count = self.call_count.lock().unwrap();
            *call_count.entry(city.to_string()).or_insert(0) += 1;
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(self.in_flight.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.responses.lock().unwrap().get(city).cloned();
        match scripted {
            Some(Scripted::Forecast(entries)) => Ok(entries),
            Some(Scripted::Failure(reason)) => Err(FetchError::Malformed {
                city: city.to_string(),
                reason,
            }),
            None => Err(FetchError::MissingList {
                city: city.to_string(),
            }),
        }
    }
}

/// A forecast entry with the given readings, for building test forecasts.
pub fn entry(
    timestamp: &str,
    temperature_kelvin: f64,
    wind_speed_mps: f64,
    precipitation_3h_mm: f64,
    condition: &str,
) -> ForecastEntry {
    ForecastEntry {
        timestamp: timestamp.to_string(),
        temperature_kelvin,
        wind_speed_mps,
        precipitation_3h_mm,
        condition: condition.to_string(),
    }
}
