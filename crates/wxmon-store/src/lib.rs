//! Durable storage for daily summaries
//!
//! The summary mapping is kept as a single JSON record in a key-value
//! store. A missing or unreadable record is treated as "no prior state",
//! never as an error, so a damaged store cannot stop the monitor.

pub mod fs;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use fs::FileKvStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteKvStore;

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use wxmon_core::{DayBucket, SummaryMapping};

/// Key holding the per-date summary mapping
pub const SUMMARY_KEY: &str = "dailySummary";

/// Key holding the running samples of the open date
pub const BUCKET_KEY: &str = "dailyBucket";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Named string records with overwrite semantics
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn put(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// In-process store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryKvStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.records
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Loads and saves the summary mapping and the open day's bucket
pub struct SummaryStore {
    kv: Box<dyn KvStore>,
}

impl SummaryStore {
    pub fn new(kv: Box<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Backend name, for logging
    pub fn backend(&self) -> &str {
        self.kv.name()
    }

    /// Load the persisted mapping, or an empty one if there is none or it
    /// cannot be read.
    pub async fn load(&self) -> SummaryMapping {
        self.load_record(SUMMARY_KEY).await.unwrap_or_default()
    }

    /// Overwrite the persisted mapping with `summaries`
    pub async fn save(&self, summaries: &SummaryMapping) -> StoreResult<()> {
        self.save_record(SUMMARY_KEY, summaries).await
    }

    pub async fn load_bucket(&self) -> Option<DayBucket> {
        self.load_record(BUCKET_KEY).await
    }

    pub async fn save_bucket(&self, bucket: &DayBucket) -> StoreResult<()> {
        self.save_record(BUCKET_KEY, bucket).await
    }

    async fn load_record<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.kv.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, backend = self.kv.name(), "no stored record");
                return None;
            }
            Err(e) => {
                warn!(key, backend = self.kv.name(), error = %e, "failed to read stored record");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, backend = self.kv.name(), error = %e, "discarding unparsable stored record");
                None
            }
        }
    }

    async fn save_record<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string(value)?;
        self.kv.put(key, &json).await
    }
}
