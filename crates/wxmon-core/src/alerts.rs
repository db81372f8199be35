//! Threshold alert evaluation

use crate::types::{Alert, Reading};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Alert threshold used when none is configured (°C)
pub const DEFAULT_THRESHOLD: f64 = 35.0;

/// Shared, externally mutable alert threshold.
///
/// Clones share the same value. The `f64` is stored as raw bits in one
/// atomic word so a reader always observes a whole value.
#[derive(Debug, Clone)]
pub struct Threshold {
    bits: Arc<AtomicU64>,
}

impl Threshold {
    pub fn new(value: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(value.to_bits())),
        }
    }

    /// Snapshot of the current threshold
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Return an alert for the first reading, in the given order, whose
/// temperature is strictly above `threshold`.
///
/// First match rather than the hottest reading: the result backs a
/// single "latest alert" display. Readings without a temperature are
/// skipped.
pub fn evaluate(readings: &[Reading], threshold: f64) -> Option<Alert> {
    readings.iter().find_map(|reading| {
        let temp = reading.temp?;
        (temp > threshold).then(|| Alert {
            source: reading.source.clone(),
            temp,
            threshold,
        })
    })
}
