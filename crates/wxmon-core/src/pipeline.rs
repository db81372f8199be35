use anyhow::Result;

use crate::{Alert, RawReading, Reading, SummaryMapping, TemperatureUnit};

/// Supplies one raw reading per reachable source for a polling cycle.
///
/// Failing sources are omitted from the returned list rather than
/// failing the whole call.
#[async_trait::async_trait]
pub trait SampleFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Scale of `raw_temp` and `raw_feels_like` in the returned readings
    fn units(&self) -> TemperatureUnit {
        TemperatureUnit::Kelvin
    }

    async fn fetch_all(&self, sources: &[String]) -> Vec<RawReading>;
}

/// Consumer of cycle results (presentation layer, logs, ...)
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        summaries: &SummaryMapping,
        readings: &[Reading],
        alert: Option<&Alert>,
    ) -> Result<()>;
}
