#![allow(dead_code)]

pub mod app;

use hazardwatch::forecast::test_utils::entry;
use hazardwatch::ForecastEntry;

/// One scorching, otherwise calm slot: a single Heatwave warning.
pub fn heatwave_forecast() -> Vec<ForecastEntry> {
    vec![
        entry("2024-05-01 12:00:00", 314.15, 3.0, 0.0, "Clear"),
        entry("2024-05-01 15:00:00", 300.0, 3.0, 0.0, "Clear"),
    ]
}

/// A forecast with nothing worth an alert.
pub fn calm_forecast() -> Vec<ForecastEntry> {
    vec![
        entry("2024-05-01 12:00:00", 295.0, 3.0, 0.0, "Clouds"),
        entry("2024-05-01 15:00:00", 293.0, 4.0, 1.0, "Rain"),
    ]
}
