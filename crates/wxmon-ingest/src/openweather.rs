//! OpenWeatherMap current-weather fetcher

use crate::{FetchError, FetchResult};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;
use wxmon_core::{RawReading, SampleFetcher, TemperatureUnit};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

const WEATHER_PATH: &str = "data/2.5/weather";

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    name: Option<String>,
    main: Option<MainBlock>,
    #[serde(default)]
    weather: Vec<ConditionBlock>,
    dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: Option<f64>,
    feels_like: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    main: Option<String>,
}

/// Parse a `/data/2.5/weather` response body.
///
/// Missing measurements come back as `None`; only a body that is not a
/// JSON object of the expected shape is an error. The requested city
/// name stands in when the response carries none.
pub fn parse_response(requested: &str, body: &str) -> FetchResult<RawReading> {
    let resp: WeatherResponse =
        serde_json::from_str(body).map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

    let source_name = resp
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| requested.to_string());

    Ok(RawReading {
        source_name,
        raw_temp: resp.main.as_ref().and_then(|m| m.temp),
        raw_feels_like: resp.main.as_ref().and_then(|m| m.feels_like),
        condition: resp.weather.into_iter().next().and_then(|w| w.main),
        observed_at: resp.dt.unwrap_or_else(|| chrono::Utc::now().timestamp()),
    })
}

/// Fetches current conditions for each city from OpenWeatherMap
pub struct OpenWeatherFetcher {
    client: Client,
    base_url: Url,
    api_key: String,
    units: TemperatureUnit,
}

impl OpenWeatherFetcher {
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> FetchResult<Self> {
        // Url::join drops the last path segment unless it ends with '/'
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            api_key: api_key.into(),
            units: TemperatureUnit::Kelvin,
        })
    }

    /// Ask the API for a specific unit system instead of Kelvin
    pub fn with_units(mut self, units: TemperatureUnit) -> Self {
        self.units = units;
        self
    }

    fn request_url(&self, city: &str) -> FetchResult<Url> {
        let mut url = self.base_url.join(WEATHER_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", city).append_pair("appid", &self.api_key);
            match self.units {
                TemperatureUnit::Kelvin => {}
                TemperatureUnit::Celsius => {
                    query.append_pair("units", "metric");
                }
                TemperatureUnit::Fahrenheit => {
                    query.append_pair("units", "imperial");
                }
            }
        }
        Ok(url)
    }

    /// Fetch a single city
    pub async fn fetch_one(&self, city: &str) -> FetchResult<RawReading> {
        let url = self.request_url(city)?;
        fetch_city(self.client.clone(), url, city.to_string()).await
    }
}

async fn fetch_city(client: Client, url: Url, city: String) -> FetchResult<RawReading> {
    // The request URL carries the API key; keep it out of error messages.
    let body = client
        .get(url)
        .send()
        .await
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| FetchError::Http(e.without_url()))?
        .text()
        .await
        .map_err(|e| FetchError::Http(e.without_url()))?;

    parse_response(&city, &body)
}

#[async_trait::async_trait]
impl SampleFetcher for OpenWeatherFetcher {
    fn name(&self) -> &str {
        "openweather"
    }

    fn units(&self) -> TemperatureUnit {
        self.units
    }

    /// Requests every city concurrently and waits for all of them to
    /// settle. Results keep the order of `sources`.
    async fn fetch_all(&self, sources: &[String]) -> Vec<RawReading> {
        let mut tasks = JoinSet::new();

        for (idx, city) in sources.iter().enumerate() {
            let url = match self.request_url(city) {
                Ok(url) => url,
                Err(e) => {
                    warn!(source = %city, error = %e, "cannot build request; omitting source");
                    continue;
                }
            };
            let client = self.client.clone();
            let city = city.clone();
            tasks.spawn(async move { (idx, fetch_city(client, url, city).await) });
        }

        let mut settled = Vec::with_capacity(sources.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, Ok(reading))) => settled.push((idx, reading)),
                Ok((idx, Err(e))) => {
                    warn!(source = %sources[idx], error = %e, "fetch failed; omitting source");
                }
                Err(e) => warn!(error = %e, "fetch task aborted"),
            }
        }

        settled.sort_by_key(|(idx, _)| *idx);
        debug!(
            requested = sources.len(),
            fetched = settled.len(),
            "fetch cycle settled"
        );
        settled.into_iter().map(|(_, reading)| reading).collect()
    }
}
