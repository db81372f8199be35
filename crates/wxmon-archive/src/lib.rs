//! Daily summary aggregation
//!
//! Folds each cycle's readings into the open day's bucket, recomputes
//! that day's summary and hands the full mapping to the summary store.

pub mod aggregator;

pub use aggregator::*;

use thiserror::Error;
use wxmon_store::StoreError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Persist error: {0}")]
    Persist(#[from] StoreError),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;
