use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use wxmon_core::{TemperatureUnit, DEFAULT_THRESHOLD};

/// Polling period used when none is configured (5 minutes)
pub const DEFAULT_INTERVAL_MS: u64 = 300_000;

pub const DEFAULT_SOURCES: [&str; 6] = [
    "Delhi",
    "Mumbai",
    "Chennai",
    "Bangalore",
    "Kolkata",
    "Hyderabad",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Polling period in milliseconds
    pub interval_ms: u64,
    /// Initial alert threshold (°C)
    pub threshold: f64,
    /// Source (city) identifiers, polled in this order
    pub sources: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            threshold: DEFAULT_THRESHOLD,
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    #[default]
    OpenWeather,
    Simulator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub kind: FetcherKind,
    pub base_url: String,
    /// Usually supplied through OWM_API_KEY instead
    pub api_key: Option<String>,
    pub units: TemperatureUnit,
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            kind: FetcherKind::OpenWeather,
            base_url: "https://api.openweathermap.org".to_string(),
            api_key: None,
            units: TemperatureUnit::Kelvin,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Directory for the file store, database file for sqlite
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::File,
            path: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HttpConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub fetcher: FetcherConfig,
    pub store: StoreConfig,
    pub http: HttpConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Load configuration from WXMON_CONFIG path (TOML) if present, with reasonable defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("WXMON_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(path)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let cfg = if path.exists() {
            let s = fs::read_to_string(path)?;
            Self::from_toml(&s)?
        } else {
            AppConfig::default()
        };
        Ok(cfg)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.interval_ms == 0 {
            return Err(ConfigError::Invalid("monitor.interval_ms must be positive".into()));
        }
        if !self.monitor.threshold.is_finite() {
            return Err(ConfigError::Invalid("monitor.threshold must be finite".into()));
        }
        if self.monitor.sources.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid("monitor.sources contains an empty name".into()));
        }
        Ok(())
    }

    /// Get HTTP bind address (default 0.0.0.0:8080)
    pub fn http_bind(&self) -> String {
        self.http
            .bind
            .clone()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bind_is_8080() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.http_bind(), "0.0.0.0:8080");
    }

    #[test]
    fn defaults_match_monitor_contract() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.monitor.interval_ms, 300_000);
        assert_eq!(cfg.monitor.threshold, 35.0);
        assert_eq!(cfg.monitor.sources.len(), 6);
        assert_eq!(cfg.monitor.sources[0], "Delhi");
        assert_eq!(cfg.fetcher.kind, FetcherKind::OpenWeather);
        assert_eq!(cfg.store.kind, StoreKind::File);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [monitor]
            threshold = 40.5
            sources = ["Pune", "Jaipur"]

            [fetcher]
            kind = "simulator"
            units = "celsius"

            [http]
            bind = "127.0.0.1:9090"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.monitor.interval_ms, DEFAULT_INTERVAL_MS);
        assert_eq!(cfg.monitor.threshold, 40.5);
        assert_eq!(cfg.monitor.sources, vec!["Pune", "Jaipur"]);
        assert_eq!(cfg.fetcher.kind, FetcherKind::Simulator);
        assert_eq!(cfg.fetcher.units, TemperatureUnit::Celsius);
        assert_eq!(cfg.fetcher.timeout_secs, 10);
        assert_eq!(cfg.http_bind(), "127.0.0.1:9090");
    }

    #[test]
    fn rejects_zero_interval() {
        let err = AppConfig::from_toml("[monitor]\ninterval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            AppConfig::from_toml("[monitor\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AppConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn loads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wxmon.toml");
        std::fs::write(&path, "[store]\nkind = \"memory\"\n").unwrap();
        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.store.kind, StoreKind::Memory);
        assert_eq!(cfg.store.path, "data");
    }
}
