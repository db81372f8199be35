//! Unit conversion utilities
//!
//! Readings are displayed in degrees Celsius with two fractional digits.
//! OpenWeatherMap reports Kelvin unless asked otherwise.

use crate::types::{RawReading, Reading};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Offset between the Kelvin and Celsius scales
pub const KELVIN_OFFSET: f64 = 273.15;

/// Unit conversion error
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("Unknown temperature unit: {0}")]
    UnknownUnit(String),
}

/// Temperature scale of a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Kelvin,
    Celsius,
    Fahrenheit,
}

impl FromStr for TemperatureUnit {
    type Err = UnitError;

    /// Accepts scale names, their initials, and the OpenWeatherMap
    /// `units` parameter values (standard, metric, imperial).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kelvin" | "k" | "standard" => Ok(TemperatureUnit::Kelvin),
            "celsius" | "c" | "metric" => Ok(TemperatureUnit::Celsius),
            "fahrenheit" | "f" | "imperial" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(UnitError::UnknownUnit(other.to_string())),
        }
    }
}

/// Round to two fractional digits
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert a temperature between scales (unrounded)
pub fn convert(value: f64, from: TemperatureUnit, to: TemperatureUnit) -> f64 {
    if from == to {
        return value;
    }

    let celsius = match from {
        TemperatureUnit::Kelvin => value - KELVIN_OFFSET,
        TemperatureUnit::Celsius => value,
        TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
    };

    match to {
        TemperatureUnit::Kelvin => celsius + KELVIN_OFFSET,
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
    }
}

/// Kelvin to display Celsius, rounded to two decimals
pub fn kelvin_to_celsius(raw: f64) -> f64 {
    round2(raw - KELVIN_OFFSET)
}

/// Convert a raw value in `unit` to the display unit (Celsius, two decimals)
pub fn to_display_unit(raw: f64, unit: TemperatureUnit) -> f64 {
    round2(convert(raw, unit, TemperatureUnit::Celsius))
}

/// Normalize a fetched reading into display units
pub fn normalize(raw: &RawReading, unit: TemperatureUnit) -> Reading {
    Reading {
        source: raw.source_name.clone(),
        temp: raw.raw_temp.map(|t| to_display_unit(t, unit)),
        feels_like: raw.raw_feels_like.map(|t| to_display_unit(t, unit)),
        condition: raw.condition.clone(),
        observed_at: DateTime::<Utc>::from_timestamp(raw.observed_at, 0).unwrap_or_default(),
    }
}
