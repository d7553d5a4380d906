//! Threshold-based hazard detection for forecast entries.

use crate::core::{ForecastEntry, ForecastWarning, HazardTag};
use std::collections::BTreeSet;

pub const KELVIN_OFFSET: f64 = 273.15;
pub const HEATWAVE_MIN_CELSIUS: f64 = 40.0;
pub const COLD_WAVE_MAX_CELSIUS: f64 = 5.0;
pub const STRONG_WIND_MIN_MPS: f64 = 15.0;
pub const HEAVY_RAIN_MIN_MM: f64 = 20.0;

/// Converts a Kelvin temperature to Celsius.
pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

/// Returns every hazard the entry matches. All thresholds are inclusive and
/// evaluated independently, so one entry can carry several tags.
pub fn classify(entry: &ForecastEntry) -> BTreeSet<HazardTag> {
    let mut hazards = BTreeSet::new();
    let celsius = kelvin_to_celsius(entry.temperature_kelvin);
    let condition = entry.condition.to_lowercase();

    if celsius >= HEATWAVE_MIN_CELSIUS {
        hazards.insert(HazardTag::Heatwave);
    }
    if celsius <= COLD_WAVE_MAX_CELSIUS {
        hazards.insert(HazardTag::ColdWave);
    }
    if entry.wind_speed_mps >= STRONG_WIND_MIN_MPS {
        hazards.insert(HazardTag::StrongWind);
    }
    if entry.precipitation_3h_mm >= HEAVY_RAIN_MIN_MM {
        hazards.insert(HazardTag::HeavyRainfall);
    }
    if condition.contains("storm") {
        hazards.insert(HazardTag::Storm);
    }
    if condition.contains("snow") {
        hazards.insert(HazardTag::Snowfall);
    }

    hazards
}

/// Classifies a whole forecast, keeping only hazardous entries in forecast order.
pub fn collect_warnings(entries: &[ForecastEntry]) -> Vec<ForecastWarning> {
    entries
        .iter()
        .filter_map(|entry| {
            let hazards = classify(entry);
            if hazards.is_empty() {
                None
            } else {
                Some(ForecastWarning {
                    entry_timestamp: entry.timestamp.clone(),
                    hazards: hazards.into_iter().collect(),
                })
            }
        })
        .collect()
}
