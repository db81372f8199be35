use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use wxmon_archive::DailyAggregator;
use wxmon_core::{Alert, Publisher, RawReading, Reading, SampleFetcher, SummaryMapping, Threshold};
use wxmon_daemon::{Scheduler, SchedulerState};
use wxmon_store::{KvStore, MemoryKvStore, StoreError, StoreResult, SummaryStore};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
}

fn sources() -> Vec<String> {
    vec!["Delhi".to_string(), "Mumbai".to_string()]
}

#[derive(Default)]
struct Probe {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Notify,
}

/// Kelvin readings: Delhi 40 °C, Mumbai 30 °C, optionally slow
struct StubFetcher {
    delay: Duration,
    empty: bool,
    probe: Arc<Probe>,
}

impl StubFetcher {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            empty: false,
            probe: Arc::new(Probe::default()),
        }
    }
}

#[async_trait::async_trait]
impl SampleFetcher for StubFetcher {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch_all(&self, sources: &[String]) -> Vec<RawReading> {
        let probe = &self.probe;
        let now = probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        probe.started.notify_one();

        tokio::time::sleep(self.delay).await;
        probe.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.empty {
            return Vec::new();
        }
        sources
            .iter()
            .map(|city| RawReading {
                source_name: city.clone(),
                raw_temp: Some(if city == "Delhi" { 313.15 } else { 303.15 }),
                raw_feels_like: None,
                condition: Some("Clear".to_string()),
                observed_at: 1_760_700_000,
            })
            .collect()
    }
}

#[derive(Default)]
struct RecordingPublisher {
    cycles: Mutex<Vec<(SummaryMapping, usize, Option<Alert>)>>,
    published: Notify,
}

impl RecordingPublisher {
    fn count(&self) -> usize {
        self.cycles.lock().unwrap().len()
    }

    async fn wait_for(&self, n: usize) {
        loop {
            let notified = self.published.notified();
            if self.count() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(
        &self,
        summaries: &SummaryMapping,
        readings: &[Reading],
        alert: Option<&Alert>,
    ) -> anyhow::Result<()> {
        self.cycles
            .lock()
            .unwrap()
            .push((summaries.clone(), readings.len(), alert.cloned()));
        self.published.notify_waiters();
        Ok(())
    }
}

/// Accepts no writes
struct BrokenKvStore;

#[async_trait::async_trait]
impl KvStore for BrokenKvStore {
    fn name(&self) -> &str {
        "broken"
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: &str) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }
}

async fn scheduler(
    fetcher: StubFetcher,
    kv: Box<dyn KvStore>,
    interval: Duration,
    publisher: Arc<RecordingPublisher>,
) -> Scheduler {
    let aggregator = DailyAggregator::open(SummaryStore::new(kv)).await;
    Scheduler::new(Box::new(fetcher), sources(), aggregator, Threshold::new(35.0), interval)
        .with_publisher(publisher)
        .with_today(day)
}

#[tokio::test]
async fn first_cycle_runs_immediately() {
    let fetcher = StubFetcher::new(Duration::ZERO);
    let publisher = Arc::new(RecordingPublisher::default());
    let mut scheduler = scheduler(
        fetcher,
        Box::new(MemoryKvStore::new()),
        Duration::from_secs(3600),
        publisher.clone(),
    )
    .await;
    let mut state = scheduler.state_watch();
    assert_eq!(*state.borrow(), SchedulerState::Idle);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            scheduler.run(cancel).await;
            scheduler
        }
    });

    tokio::time::timeout(Duration::from_secs(5), publisher.wait_for(1))
        .await
        .expect("first cycle should not wait for the interval");
    assert_eq!(*state.borrow_and_update(), SchedulerState::Running);

    cancel.cancel();
    let scheduler = handle.await.unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Cancelled);

    let cycles = publisher.cycles.lock().unwrap();
    assert_eq!(cycles.len(), 1);
    let (summaries, readings, alert) = &cycles[0];
    assert_eq!(*readings, 2);
    assert_eq!(summaries[&day()].average_temp, 35.0);
    assert_eq!(summaries[&day()].max_temp, 40.0);
    let alert = alert.as_ref().unwrap();
    assert_eq!(alert.source, "Delhi");
    assert_eq!(alert.threshold, 35.0);
}

#[tokio::test]
async fn survives_persist_failures() {
    let fetcher = StubFetcher::new(Duration::ZERO);
    let publisher = Arc::new(RecordingPublisher::default());
    let mut scheduler = scheduler(
        fetcher,
        Box::new(BrokenKvStore),
        Duration::from_millis(20),
        publisher.clone(),
    )
    .await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            scheduler.run(cancel).await;
            scheduler
        }
    });

    tokio::time::timeout(Duration::from_secs(5), publisher.wait_for(3))
        .await
        .expect("scheduler stopped after a persist failure");
    cancel.cancel();
    let scheduler = handle.await.unwrap();

    assert!(scheduler.aggregator().is_dirty());
    // In-memory state keeps accumulating across failed saves
    assert!(scheduler.aggregator().bucket().unwrap().len() >= 6);
}

#[tokio::test]
async fn report_flags_unpersisted_cycle() {
    let fetcher = StubFetcher::new(Duration::ZERO);
    let publisher = Arc::new(RecordingPublisher::default());
    let mut scheduler = scheduler(
        fetcher,
        Box::new(BrokenKvStore),
        Duration::from_secs(60),
        publisher,
    )
    .await;

    let report = scheduler.run_cycle().await;
    assert_eq!(report.fetched, 2);
    assert_eq!(report.aggregated, 2);
    assert!(!report.persisted);
}

#[tokio::test]
async fn cycles_never_overlap() {
    let fetcher = StubFetcher::new(Duration::from_millis(50));
    let probe = fetcher.probe.clone();
    let publisher = Arc::new(RecordingPublisher::default());
    let mut scheduler = scheduler(
        fetcher,
        Box::new(MemoryKvStore::new()),
        Duration::from_millis(10),
        publisher.clone(),
    )
    .await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(cancel).await }
    });

    tokio::time::timeout(Duration::from_secs(5), publisher.wait_for(4))
        .await
        .unwrap();
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn in_flight_cycle_completes_on_cancel() {
    let fetcher = StubFetcher::new(Duration::from_millis(100));
    let probe = fetcher.probe.clone();
    let publisher = Arc::new(RecordingPublisher::default());
    let mut scheduler = scheduler(
        fetcher,
        Box::new(MemoryKvStore::new()),
        Duration::from_secs(3600),
        publisher.clone(),
    )
    .await;

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            scheduler.run(cancel).await;
            scheduler
        }
    });

    probe.started.notified().await;
    cancel.cancel();
    let scheduler = handle.await.unwrap();

    assert_eq!(publisher.count(), 1);
    assert!(!scheduler.aggregator().is_dirty());
    assert_eq!(scheduler.aggregator().bucket().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_fetch_keeps_previous_view() {
    let mut stub = StubFetcher::new(Duration::ZERO);
    stub.empty = true;
    let publisher = Arc::new(RecordingPublisher::default());
    let mut scheduler = scheduler(
        stub,
        Box::new(MemoryKvStore::new()),
        Duration::from_secs(60),
        publisher.clone(),
    )
    .await;

    let report = scheduler.run_cycle().await;
    assert_eq!(report.fetched, 0);
    assert_eq!(report.aggregated, 0);
    assert_eq!(report.alert, None);
    assert_eq!(publisher.count(), 0);
    assert!(scheduler.aggregator().summaries().is_empty());
}

#[tokio::test]
async fn threshold_changes_apply_next_cycle() {
    let fetcher = StubFetcher::new(Duration::ZERO);
    let threshold = Threshold::new(35.0);
    let aggregator = DailyAggregator::open(SummaryStore::new(Box::new(MemoryKvStore::new()))).await;
    let mut scheduler = Scheduler::new(
        Box::new(fetcher),
        sources(),
        aggregator,
        threshold.clone(),
        Duration::from_secs(60),
    )
    .with_today(day);

    assert!(scheduler.run_cycle().await.alert.is_some());

    threshold.set(45.0);
    assert_eq!(scheduler.run_cycle().await.alert, None);

    threshold.set(25.0);
    let alert = scheduler.run_cycle().await.alert.unwrap();
    assert_eq!(alert.source, "Delhi");
    assert_eq!(alert.threshold, 25.0);
}
