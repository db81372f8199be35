//! Simulated city weather source for testing and offline runs

use wxmon_core::{RawReading, SampleFetcher, Timestamp, KELVIN_OFFSET};

const CONDITIONS: [&str; 5] = ["Clear", "Clouds", "Haze", "Rain", "Mist"];

/// Generates synthetic Kelvin readings that drift with the clock
pub struct SimulatorFetcher {
    base_temp: f64,
}

impl SimulatorFetcher {
    /// `base_temp` is the mean temperature in °C around which cities vary
    pub fn new(base_temp: f64) -> Self {
        Self { base_temp }
    }

    /// Reading for `city` at `now` (epoch seconds)
    pub fn generate(&self, city: &str, now: Timestamp) -> RawReading {
        let seed = city
            .bytes()
            .fold(0i64, |acc, b| acc.wrapping_mul(31).wrapping_add(i64::from(b)))
            .rem_euclid(1000);

        // City offset of -5..+5 °C plus a drift of -2.5..+2.5 °C
        let city_offset = (seed % 100) as f64 / 10.0 - 5.0;
        let drift = ((now + seed).rem_euclid(50)) as f64 / 10.0 - 2.5;
        let celsius = self.base_temp + city_offset + drift;

        let condition = CONDITIONS[((now / 300 + seed).rem_euclid(CONDITIONS.len() as i64)) as usize];

        RawReading {
            source_name: city.to_string(),
            raw_temp: Some(celsius + KELVIN_OFFSET),
            raw_feels_like: Some(celsius + 1.5 + KELVIN_OFFSET),
            condition: Some(condition.to_string()),
            observed_at: now,
        }
    }
}

impl Default for SimulatorFetcher {
    fn default() -> Self {
        Self::new(28.0)
    }
}

#[async_trait::async_trait]
impl SampleFetcher for SimulatorFetcher {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn fetch_all(&self, sources: &[String]) -> Vec<RawReading> {
        let now = chrono::Utc::now().timestamp();
        sources.iter().map(|city| self.generate(city, now)).collect()
    }
}
