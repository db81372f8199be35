//! Daily summary aggregation logic

use crate::ArchiveResult;
use tracing::{debug, info, instrument, warn};
use wxmon_core::{DateKey, DayBucket, Reading, SummaryMapping};
use wxmon_store::SummaryStore;

/// Today's date in the process-local time zone
pub fn local_today() -> DateKey {
    chrono::Local::now().date_naive()
}

/// Fold `readings` into `bucket` and return the mapping with `today`'s
/// summary recomputed over everything accumulated for that date.
///
/// The bucket rolls over to `today` when it belongs to an earlier date;
/// summaries of earlier dates stay as they are. Readings missing a
/// temperature or condition are skipped. When nothing usable arrives
/// (including an empty `readings`) both the bucket and the mapping are
/// left unchanged.
pub fn ingest(
    summaries: &SummaryMapping,
    bucket: &mut DayBucket,
    readings: &[Reading],
    today: DateKey,
) -> SummaryMapping {
    ingest_counted(summaries, bucket, readings, today).0
}

fn ingest_counted(
    summaries: &SummaryMapping,
    bucket: &mut DayBucket,
    readings: &[Reading],
    today: DateKey,
) -> (SummaryMapping, usize) {
    let valid: Vec<&Reading> = readings
        .iter()
        .filter(|r| r.aggregatable().is_some())
        .collect();

    if readings.len() != valid.len() {
        debug!(
            skipped = readings.len() - valid.len(),
            "skipping readings without temperature or condition"
        );
    }

    if valid.is_empty() {
        return (summaries.clone(), 0);
    }

    if bucket.date != today {
        debug!(from = %bucket.date, to = %today, "rolling day bucket over");
        *bucket = DayBucket::new(today);
    }

    for reading in &valid {
        bucket.add(reading);
    }

    let mut next = summaries.clone();
    if let Some(summary) = bucket.summary() {
        next.insert(today, summary);
    }
    (next, valid.len())
}

/// Owner of the summary mapping and the open day's bucket
pub struct DailyAggregator {
    summaries: SummaryMapping,
    bucket: Option<DayBucket>,
    store: SummaryStore,
    dirty: bool,
}

impl DailyAggregator {
    /// Restore state from `store`; missing or unreadable state starts empty.
    ///
    /// The bucket is saved before the mapping, so a stored bucket is never
    /// older than the stored summary of its date. When the mapping lags
    /// behind, that date's summary is rebuilt from the bucket.
    pub async fn open(store: SummaryStore) -> Self {
        let mut summaries = store.load().await;
        let bucket = store.load_bucket().await;

        let mut dirty = false;
        if let Some(open) = &bucket {
            if let Some(summary) = open.summary() {
                if summaries.get(&open.date) != Some(&summary) {
                    warn!(date = %open.date, "stored summary lags the day bucket; rebuilding");
                    summaries.insert(open.date, summary);
                    dirty = true;
                }
            }
        }

        info!(
            backend = store.backend(),
            days = summaries.len(),
            open_bucket = ?bucket.as_ref().map(|b| b.date),
            "Loaded daily summaries"
        );

        Self {
            summaries,
            bucket,
            store,
            dirty,
        }
    }

    /// Aggregate one cycle of readings into `today` and persist the result.
    ///
    /// Returns the number of readings aggregated. A persist failure is
    /// returned after the in-memory state has been updated; the next call
    /// saves again.
    #[instrument(skip(self, readings), fields(readings = readings.len()))]
    pub async fn add_readings(&mut self, readings: &[Reading], today: DateKey) -> ArchiveResult<usize> {
        let bucket = self.bucket.get_or_insert_with(|| DayBucket::new(today));
        let (next, accepted) = ingest_counted(&self.summaries, bucket, readings, today);

        if accepted > 0 {
            self.summaries = next;
            self.dirty = true;
            debug!(accepted, samples = bucket.len(), "aggregated readings");
        }

        if self.dirty {
            self.persist().await?;
        }

        Ok(accepted)
    }

    // Bucket first: a crash between the two writes must leave the samples
    // ahead of the mapping, never behind it.
    async fn persist(&mut self) -> ArchiveResult<()> {
        if let Some(bucket) = &self.bucket {
            self.store.save_bucket(bucket).await.map_err(|e| {
                warn!(error = %e, "failed to persist day bucket");
                e
            })?;
        }

        self.store.save(&self.summaries).await.map_err(|e| {
            warn!(error = %e, "failed to persist daily summaries");
            e
        })?;

        self.dirty = false;
        Ok(())
    }

    pub fn summaries(&self) -> &SummaryMapping {
        &self.summaries
    }

    pub fn bucket(&self) -> Option<&DayBucket> {
        self.bucket.as_ref()
    }

    /// True while the latest state has not been persisted
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
