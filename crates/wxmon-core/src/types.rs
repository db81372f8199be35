//! Core data types for city weather readings and daily summaries

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Timestamp type (Unix epoch seconds)
pub type Timestamp = i64;

/// Calendar date a summary is keyed by, in the process-local time zone
pub type DateKey = NaiveDate;

/// Per-day summaries in insertion order, one entry per date
pub type SummaryMapping = IndexMap<DateKey, DaySummary>;

/// Reading as delivered by a sample fetcher, before unit normalization
///
/// Every measurement is optional because upstream payloads are not
/// guaranteed to carry them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    /// Source (city) identifier as reported upstream
    pub source_name: String,

    /// Temperature in the fetcher's source unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_temp: Option<f64>,

    /// "Feels like" temperature in the fetcher's source unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_feels_like: Option<f64>,

    /// Categorical condition, e.g. "Clear" or "Rain"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Observation time (Unix epoch seconds)
    #[serde(rename = "observedAtEpochSeconds")]
    pub observed_at: Timestamp,
}

/// One normalized measurement from one source at one instant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub source: String,

    /// Temperature in degrees Celsius, two decimals
    pub temp: Option<f64>,

    /// "Feels like" temperature in degrees Celsius, two decimals
    pub feels_like: Option<f64>,

    pub condition: Option<String>,

    pub observed_at: DateTime<Utc>,
}

impl Reading {
    /// Temperature and condition, when both are usable for aggregation
    pub fn aggregatable(&self) -> Option<(f64, &str)> {
        let temp = self.temp.filter(|t| t.is_finite())?;
        let condition = self
            .condition
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())?;
        Some((temp, condition))
    }
}

/// Aggregated statistics for every reading observed on one calendar date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    pub average_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub dominant_condition: String,
}

/// A reading that exceeded the alert threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub source: String,
    pub temp: f64,
    /// Threshold in effect when the alert was evaluated
    pub threshold: f64,
}
