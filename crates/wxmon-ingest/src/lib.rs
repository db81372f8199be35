//! Sample fetchers for city weather readings
//!
//! Every fetcher implements [`wxmon_core::SampleFetcher`]: one raw
//! reading per reachable source, with failing sources left out of the
//! result instead of failing the cycle.

pub mod openweather;
pub mod simulator;

pub use openweather::*;
pub use simulator::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

pub type FetchResult<T> = Result<T, FetchError>;
