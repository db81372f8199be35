//! Polling cycle scheduler

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wxmon_archive::{local_today, DailyAggregator};
use wxmon_core::{
    evaluate, normalize, Alert, DateKey, Publisher, Reading, SampleFetcher, Threshold,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Cancelled,
}

/// Outcome of a single fetch → aggregate → persist → evaluate pass
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Readings returned by the fetcher
    pub fetched: usize,
    /// Readings folded into today's summary
    pub aggregated: usize,
    pub alert: Option<Alert>,
    /// False when the store write failed and will be retried
    pub persisted: bool,
}

/// Scheduler drives the polling cycle at a fixed interval
pub struct Scheduler {
    fetcher: Box<dyn SampleFetcher>,
    sources: Vec<String>,
    aggregator: DailyAggregator,
    threshold: Threshold,
    publishers: Vec<Arc<dyn Publisher>>,
    interval: Duration,
    today: Box<dyn Fn() -> DateKey + Send + Sync>,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        fetcher: Box<dyn SampleFetcher>,
        sources: Vec<String>,
        aggregator: DailyAggregator,
        threshold: Threshold,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            fetcher,
            sources,
            aggregator,
            threshold,
            publishers: Vec::new(),
            interval,
            today: Box::new(local_today),
            state,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    /// Override the date source (process-local calendar date by default)
    pub fn with_today<F>(mut self, today: F) -> Self
    where
        F: Fn() -> DateKey + Send + Sync + 'static,
    {
        self.today = Box::new(today);
        self
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn aggregator(&self) -> &DailyAggregator {
        &self.aggregator
    }

    /// Run one cycle now, then one per interval until `cancel` fires.
    ///
    /// Cancellation is only observed between cycles, so a running cycle
    /// always finishes. Ticks that fall due while a cycle runs are skipped.
    pub async fn run(&mut self, cancel: CancellationToken) {
        self.state.send_replace(SchedulerState::Running);
        info!(
            fetcher = self.fetcher.name(),
            sources = self.sources.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    debug!(?report, "cycle complete");
                }
            }
        }

        self.state.send_replace(SchedulerState::Cancelled);
        info!("Scheduler stopped");
    }

    /// Execute a single polling cycle. Never fails: every error is logged
    /// and reflected in the report.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let raw = self.fetcher.fetch_all(&self.sources).await;
        let units = self.fetcher.units();
        let readings: Vec<Reading> = raw.iter().map(|r| normalize(r, units)).collect();

        if readings.len() < self.sources.len() {
            warn!(
                requested = self.sources.len(),
                received = readings.len(),
                "some sources returned no reading"
            );
        }

        let today = (self.today)();
        let aggregated = match self.aggregator.add_readings(&readings, today).await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "failed to persist summaries, retrying next cycle");
                readings.iter().filter(|r| r.aggregatable().is_some()).count()
            }
        };
        let persisted = !self.aggregator.is_dirty();

        if readings.is_empty() {
            warn!("no readings this cycle, keeping previous view");
            return CycleReport {
                fetched: 0,
                aggregated,
                alert: None,
                persisted,
            };
        }

        let threshold = self.threshold.get();
        let alert = evaluate(&readings, threshold);
        if let Some(alert) = &alert {
            info!(
                source = %alert.source,
                temp = alert.temp,
                threshold = alert.threshold,
                "temperature above threshold"
            );
        }

        for publisher in &self.publishers {
            if let Err(e) = publisher
                .publish(self.aggregator.summaries(), &readings, alert.as_ref())
                .await
            {
                warn!(error = %e, "failed to publish cycle");
            }
        }

        CycleReport {
            fetched: readings.len(),
            aggregated,
            alert,
            persisted,
        }
    }
}
