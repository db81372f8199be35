//! Daemon configuration: TOML file plus environment overrides

use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use std::time::Duration;
use wxmon_config::{AppConfig, FetcherConfig, FetcherKind, StoreConfig, StoreKind};
use wxmon_core::SampleFetcher;
use wxmon_ingest::{OpenWeatherFetcher, SimulatorFetcher};
use wxmon_store::{FileKvStore, KvStore, MemoryKvStore, SummaryStore};

#[derive(Clone)]
pub struct DaemonConfig {
    /// Polling period
    pub interval: Duration,

    /// Initial alert threshold (°C)
    pub threshold: f64,

    /// Cities to poll, in order
    pub sources: Vec<String>,

    pub fetcher: FetcherConfig,

    pub store: StoreConfig,

    /// HTTP bind address for the presentation API
    pub http_bind: String,
}

impl fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("interval", &self.interval)
            .field("threshold", &self.threshold)
            .field("sources", &self.sources)
            .field("fetcher", &self.fetcher.kind)
            .field("base_url", &self.fetcher.base_url)
            .field("api_key", &self.fetcher.api_key.as_ref().map(|_| "<redacted>"))
            .field("store", &self.store)
            .field("http_bind", &self.http_bind)
            .finish()
    }
}

impl DaemonConfig {
    /// Load the config file named by WXMON_CONFIG, then apply environment overrides
    pub fn from_env() -> Result<Self> {
        let app = AppConfig::load().context("Failed to load configuration file")?;
        Self::resolve(app, |key| env::var(key).ok())
    }

    /// Apply overrides from `lookup` on top of `app`.
    ///
    /// Recognized keys: POLL_INTERVAL_MS, ALERT_THRESHOLD, WXMON_SOURCES
    /// (comma separated), OWM_API_KEY, HTTP_BIND.
    pub fn resolve(app: AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let interval_ms: u64 = match lookup("POLL_INTERVAL_MS") {
            Some(v) => v.parse().context("Invalid POLL_INTERVAL_MS")?,
            None => app.monitor.interval_ms,
        };
        if interval_ms == 0 {
            bail!("Polling interval must be positive");
        }

        let threshold: f64 = match lookup("ALERT_THRESHOLD") {
            Some(v) => v.parse().context("Invalid ALERT_THRESHOLD")?,
            None => app.monitor.threshold,
        };
        if !threshold.is_finite() {
            bail!("Alert threshold must be finite");
        }

        let sources = match lookup("WXMON_SOURCES") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => app.monitor.sources.clone(),
        };

        let mut fetcher = app.fetcher.clone();
        if let Some(key) = lookup("OWM_API_KEY").filter(|k| !k.is_empty()) {
            fetcher.api_key = Some(key);
        }

        let http_bind = lookup("HTTP_BIND").unwrap_or_else(|| app.http_bind());

        Ok(Self {
            interval: Duration::from_millis(interval_ms),
            threshold,
            sources,
            fetcher,
            store: app.store,
            http_bind,
        })
    }

    /// Build the configured sample fetcher
    pub fn build_fetcher(&self) -> Result<Box<dyn SampleFetcher>> {
        match self.fetcher.kind {
            FetcherKind::OpenWeather => {
                let api_key = self.fetcher.api_key.clone().context(
                    "OWM_API_KEY not set (set fetcher.api_key or use fetcher.kind = \"simulator\")",
                )?;
                let fetcher = OpenWeatherFetcher::new(
                    &self.fetcher.base_url,
                    api_key,
                    Duration::from_secs(self.fetcher.timeout_secs),
                )
                .context("Failed to build OpenWeatherMap client")?
                .with_units(self.fetcher.units);
                Ok(Box::new(fetcher))
            }
            FetcherKind::Simulator => Ok(Box::new(SimulatorFetcher::default())),
        }
    }

    /// Build the configured summary store
    pub fn build_store(&self) -> Result<SummaryStore> {
        let kv: Box<dyn KvStore> = match self.store.kind {
            StoreKind::File => Box::new(
                FileKvStore::new(&self.store.path)
                    .with_context(|| format!("Failed to open store directory {}", self.store.path))?,
            ),
            #[cfg(feature = "sqlite")]
            StoreKind::Sqlite => Box::new(
                wxmon_store::SqliteKvStore::new(&self.store.path)
                    .with_context(|| format!("Failed to open sqlite store {}", self.store.path))?,
            ),
            #[cfg(not(feature = "sqlite"))]
            StoreKind::Sqlite => bail!("Built without sqlite support (enable the `sqlite` feature)"),
            StoreKind::Memory => Box::new(MemoryKvStore::new()),
        };
        Ok(SummaryStore::new(kv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = DaemonConfig::resolve(AppConfig::default(), lookup(&[])).unwrap();

        assert_eq!(config.interval, Duration::from_millis(300_000));
        assert_eq!(config.threshold, 35.0);
        assert_eq!(config.sources.len(), 6);
        assert_eq!(config.http_bind, "0.0.0.0:8080");
        assert_eq!(config.fetcher.api_key, None);
    }

    #[test]
    fn test_env_overrides() {
        let config = DaemonConfig::resolve(
            AppConfig::default(),
            lookup(&[
                ("POLL_INTERVAL_MS", "60000"),
                ("ALERT_THRESHOLD", "41.5"),
                ("WXMON_SOURCES", "Delhi, Pune ,,Jaipur"),
                ("OWM_API_KEY", "secret"),
                ("HTTP_BIND", "127.0.0.1:3000"),
            ]),
        )
        .unwrap();

        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.threshold, 41.5);
        assert_eq!(config.sources, vec!["Delhi", "Pune", "Jaipur"]);
        assert_eq!(config.fetcher.api_key.as_deref(), Some("secret"));
        assert_eq!(config.http_bind, "127.0.0.1:3000");
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        assert!(DaemonConfig::resolve(AppConfig::default(), lookup(&[("POLL_INTERVAL_MS", "soon")])).is_err());
        assert!(DaemonConfig::resolve(AppConfig::default(), lookup(&[("POLL_INTERVAL_MS", "0")])).is_err());
        assert!(DaemonConfig::resolve(AppConfig::default(), lookup(&[("ALERT_THRESHOLD", "NaN")])).is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = DaemonConfig::resolve(
            AppConfig::default(),
            lookup(&[("OWM_API_KEY", "top-secret")]),
        )
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_openweather_requires_api_key() {
        let config = DaemonConfig::resolve(AppConfig::default(), lookup(&[])).unwrap();
        assert!(config.build_fetcher().is_err());

        let config =
            DaemonConfig::resolve(AppConfig::default(), lookup(&[("OWM_API_KEY", "k")])).unwrap();
        assert_eq!(config.build_fetcher().unwrap().name(), "openweather");
    }

    #[test]
    fn test_builds_simulator_and_memory_store() {
        let mut app = AppConfig::default();
        app.fetcher.kind = FetcherKind::Simulator;
        app.store.kind = StoreKind::Memory;
        let config = DaemonConfig::resolve(app, lookup(&[])).unwrap();

        assert_eq!(config.build_fetcher().unwrap().name(), "simulator");
        assert_eq!(config.build_store().unwrap().backend(), "memory");
    }
}
