//! Daily rollup calculations over accumulated samples

use crate::types::{DateKey, DaySummary, Reading};
use crate::units::round2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Running samples behind one date's summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayBucket {
    pub date: DateKey,
    pub temps: Vec<f64>,
    pub conditions: Vec<String>,
}

impl DayBucket {
    pub fn new(date: DateKey) -> Self {
        Self {
            date,
            temps: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Append a reading's temperature and condition.
    ///
    /// Returns `false` and leaves the bucket untouched when the reading
    /// lacks either field.
    pub fn add(&mut self, reading: &Reading) -> bool {
        match reading.aggregatable() {
            Some((temp, condition)) => {
                self.temps.push(temp);
                self.conditions.push(condition.to_string());
                true
            }
            None => false,
        }
    }

    /// Summary over everything accumulated so far
    pub fn summary(&self) -> Option<DaySummary> {
        summarize(&self.temps, &self.conditions)
    }

    pub fn len(&self) -> usize {
        self.temps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.temps.is_empty()
    }
}

/// Average, maximum and minimum of a temperature series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureStats {
    pub average: f64,
    pub max: f64,
    pub min: f64,
}

impl TemperatureStats {
    /// Compute stats over the whole series, each rounded to two decimals.
    ///
    /// Returns `None` for an empty series.
    pub fn from_samples(temps: &[f64]) -> Option<Self> {
        if temps.is_empty() {
            return None;
        }

        let sum: f64 = temps.iter().sum();
        let max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = temps.iter().copied().fold(f64::INFINITY, f64::min);

        Some(Self {
            average: round2(sum / temps.len() as f64),
            max: round2(max),
            min: round2(min),
        })
    }
}

/// Most frequent condition in observation order.
///
/// On a tie the condition that reached the winning count first wins:
/// the leader only changes when another condition strictly overtakes it.
pub fn dominant_condition<S: AsRef<str>>(conditions: &[S]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut leader: Option<(&str, usize)> = None;

    for condition in conditions {
        let condition = condition.as_ref();
        let count = counts.entry(condition).or_insert(0);
        *count += 1;

        if leader.map_or(true, |(_, best)| *count > best) {
            leader = Some((condition, *count));
        }
    }

    leader.map(|(condition, _)| condition.to_string())
}

/// Summarize an accumulated day of samples
pub fn summarize<S: AsRef<str>>(temps: &[f64], conditions: &[S]) -> Option<DaySummary> {
    let stats = TemperatureStats::from_samples(temps)?;
    let dominant_condition = dominant_condition(conditions)?;

    Some(DaySummary {
        average_temp: stats.average,
        max_temp: stats.max,
        min_temp: stats.min,
        dominant_condition,
    })
}
