//! HTTP presentation layer for the city weather monitor
//!
//! Serves the daily summaries, the latest readings and alert, and lets a
//! front end read and change the alert threshold.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use opentelemetry::metrics::{Counter, MeterProvider};
use opentelemetry_prometheus::exporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use wxmon_core::{evaluate, Alert, Publisher, Reading, SummaryMapping, Threshold};

pub struct AppState {
    ready: AtomicBool,
    registry: Registry,
    #[allow(dead_code)]
    provider: SdkMeterProvider,
    requests_total: Counter<u64>,
    cycles_total: Counter<u64>,
    alerts_total: Counter<u64>,
    threshold: Threshold,
    summaries: Mutex<SummaryMapping>,
    latest: Mutex<LatestCycle>,
}

/// Readings of the last cycle and the alert derived from them. Kept under
/// one lock so the alert always matches the readings and the threshold.
#[derive(Default)]
struct LatestCycle {
    readings: Option<Vec<Reading>>,
    alert: Option<Alert>,
}

impl AppState {
    pub fn threshold(&self) -> &Threshold {
        &self.threshold
    }

    pub async fn summaries(&self) -> SummaryMapping {
        self.summaries.lock().await.clone()
    }

    pub async fn latest_alert(&self) -> Option<Alert> {
        self.latest.lock().await.alert.clone()
    }
}

/// Build the router around a shared `threshold`; the scheduler holds a
/// clone of the same handle.
pub fn build_app(threshold: Threshold) -> Result<(Router, Arc<AppState>)> {
    // Prometheus exporter via OpenTelemetry
    let registry = Registry::new();
    let reader = exporter()
        .with_registry(registry.clone())
        .build()
        .context("failed to build prometheus exporter")?;
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    let meter = provider.meter("wxmon-api");

    let requests_total = meter
        .u64_counter("wxmon_requests_total")
        .with_description("Total HTTP requests served")
        .init();
    let cycles_total = meter
        .u64_counter("wxmon_cycles_total")
        .with_description("Completed polling cycles")
        .init();
    let alerts_total = meter
        .u64_counter("wxmon_alerts_total")
        .with_description("Polling cycles that raised an alert")
        .init();

    let state = Arc::new(AppState {
        ready: AtomicBool::new(false),
        registry,
        provider,
        requests_total,
        cycles_total,
        alerts_total,
        threshold,
        summaries: Mutex::new(SummaryMapping::new()),
        latest: Mutex::new(LatestCycle::default()),
    });

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/summary", get(summary))
        .route("/api/v1/current", get(current))
        .route("/api/v1/alert", get(alert))
        .route("/api/v1/threshold", get(get_threshold).put(put_threshold))
        .with_state(Arc::clone(&state));

    Ok((router, state))
}

pub fn set_ready(state: &Arc<AppState>, is_ready: bool) {
    state.ready.store(is_ready, Ordering::Relaxed);
}

/// Replace the served view with the outcome of one cycle.
///
/// `alert` is kept only if it was evaluated at the current threshold;
/// otherwise the readings are evaluated again.
pub async fn publish_cycle(
    state: &AppState,
    summaries: &SummaryMapping,
    readings: &[Reading],
    alert: Option<&Alert>,
) {
    *state.summaries.lock().await = summaries.clone();

    let mut latest = state.latest.lock().await;
    // Read under the lock: a threshold update either lands before this
    // read or re-evaluates after the lock is released.
    let threshold = state.threshold.get();
    let alert = match alert {
        Some(alert) if alert.threshold == threshold => Some(alert.clone()),
        _ => evaluate(readings, threshold),
    };
    let raised = alert.is_some();
    latest.readings = Some(readings.to_vec());
    latest.alert = alert;
    drop(latest);

    state.cycles_total.add(1, &[]);
    if raised {
        state.alerts_total.add(1, &[]);
    }
}

#[async_trait::async_trait]
impl Publisher for AppState {
    async fn publish(
        &self,
        summaries: &SummaryMapping,
        readings: &[Reading],
        alert: Option<&Alert>,
    ) -> Result<()> {
        publish_cycle(self, summaries, readings, alert).await;
        Ok(())
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> StatusCode {
    state.requests_total.add(1, &[]);
    StatusCode::OK
}

async fn readyz(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(
    State(state): State<Arc<AppState>>,
) -> (
    [(axum::http::header::HeaderName, axum::http::HeaderValue); 1],
    String,
) {
    let encoder = TextEncoder::new();
    let metric_families = state.registry.gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buf) {
        tracing::warn!(error=?e, "failed to encode metrics");
    }
    let body = String::from_utf8(buf).unwrap_or_default();
    let header = (
        header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    ([header], body)
}

async fn summary(State(state): State<Arc<AppState>>) -> Json<SummaryMapping> {
    state.requests_total.add(1, &[]);
    Json(state.summaries().await)
}

async fn current(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.requests_total.add(1, &[]);
    let latest = state.latest.lock().await;
    if let Some(readings) = latest.readings.as_ref() {
        return (StatusCode::OK, Json(readings)).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertView {
    pub alert: Option<Alert>,
    pub threshold: f64,
}

async fn alert(State(state): State<Arc<AppState>>) -> Json<AlertView> {
    state.requests_total.add(1, &[]);
    Json(AlertView {
        alert: state.latest_alert().await,
        threshold: state.threshold.get(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThresholdBody {
    pub threshold: f64,
}

async fn get_threshold(State(state): State<Arc<AppState>>) -> Json<ThresholdBody> {
    state.requests_total.add(1, &[]);
    Json(ThresholdBody {
        threshold: state.threshold.get(),
    })
}

/// Change the threshold and re-evaluate the latest readings against it
async fn put_threshold(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ThresholdBody>,
) -> impl IntoResponse {
    state.requests_total.add(1, &[]);
    if !body.threshold.is_finite() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "threshold must be a finite number"})),
        )
            .into_response();
    }

    state.threshold.set(body.threshold);
    let mut guard = state.latest.lock().await;
    let latest = &mut *guard;
    if let Some(readings) = latest.readings.as_ref() {
        latest.alert = evaluate(readings, body.threshold);
    }
    drop(guard);

    tracing::info!(threshold = body.threshold, "alert threshold updated");
    (StatusCode::OK, Json(body)).into_response()
}
