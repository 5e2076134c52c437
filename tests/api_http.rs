// tests/api_http.rs
//
// HTTP-level tests for the run trigger without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use tower::ServiceExt as _; // for `oneshot`

use screener_alerts::api::{self, AppState};
use screener_alerts::calendar::{FixedClock, TradingCalendar};
use screener_alerts::config::ScreenerConfig;
use screener_alerts::fetch::{PageFetcher, Row};
use screener_alerts::notify::Notifier;
use screener_alerts::snapshot::SnapshotStore;
use screener_alerts::Runner;

const BODY_LIMIT: usize = 1024 * 1024;

struct EmptyFetcher;

#[async_trait::async_trait]
impl PageFetcher for EmptyFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<Row>> {
        Ok(Vec::new())
    }
}

struct PanickingFetcher;

#[async_trait::async_trait]
impl PageFetcher for PanickingFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<Row>> {
        panic!("screener layout changed");
    }
}

/// Sleeps inside every fetch and remembers the most fetches ever in flight.
#[derive(Default)]
struct SlowFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl PageFetcher for SlowFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<Row>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

struct SilentNotifier;

#[async_trait::async_trait]
impl Notifier for SilentNotifier {
    async fn send(&self, _message: &str) -> bool {
        true
    }
}

fn test_router(
    state_dir: &tempfile::TempDir,
    fetcher: Arc<dyn PageFetcher>,
    now: chrono::DateTime<Utc>,
) -> Router {
    let cfg = ScreenerConfig::default();
    let store = SnapshotStore::new(
        state_dir.path().join("state.json"),
        TradingCalendar::from_config(&cfg),
    );
    let runner = Runner::new(cfg, store, fetcher, Arc::new(SilentNotifier))
        .expect("default config is valid")
        .with_clock(Arc::new(FixedClock(now)));
    api::router(AppState::new(runner), None)
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    String::from_utf8(bytes).expect("utf8")
}

#[tokio::test]
async fn health_returns_200_and_ok_body() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_router(&dir, Arc::new(EmptyFetcher), Utc::now());

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await.trim(), "ok");
}

#[tokio::test]
async fn trigger_on_weekend_reports_market_closed() {
    let dir = tempfile::tempdir().unwrap();
    // Sunday 2026-01-04 06:00 UTC (11:30 IST)
    let sunday = Utc.with_ymd_and_hms(2026, 1, 4, 6, 0, 0).unwrap();
    let app = test_router(&dir, Arc::new(EmptyFetcher), sunday);

    let req = Request::builder()
        .method("POST")
        .uri("/")
        .body(Body::empty())
        .expect("build POST /");

    let resp = app.oneshot(req).await.expect("oneshot POST /");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "OK: market closed");
    assert!(!dir.path().join("state.json").exists());
}

#[tokio::test]
async fn trigger_in_session_runs_and_saves_state() {
    let dir = tempfile::tempdir().unwrap();
    // Monday 2026-01-05 05:00 UTC (10:30 IST)
    let monday = Utc.with_ymd_and_hms(2026, 1, 5, 5, 0, 0).unwrap();
    let app = test_router(&dir, Arc::new(EmptyFetcher), monday);

    let req = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .expect("build GET /");

    let resp = app.oneshot(req).await.expect("oneshot GET /");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "OK: 0 new, 0 alerted");
    assert!(dir.path().join("state.json").exists());
}

#[tokio::test]
async fn panicking_run_maps_to_500() {
    let dir = tempfile::tempdir().unwrap();
    let monday = Utc.with_ymd_and_hms(2026, 1, 5, 5, 0, 0).unwrap();
    let app = test_router(&dir, Arc::new(PanickingFetcher), monday);

    let req = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::empty())
        .expect("build GET /");

    let resp = app.oneshot(req).await.expect("oneshot GET /");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn abandoned_request_keeps_later_runs_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let monday = Utc.with_ymd_and_hms(2026, 1, 5, 5, 0, 0).unwrap();
    let fetcher = Arc::new(SlowFetcher::default());
    let app = test_router(&dir, fetcher.clone(), monday);

    let get = || {
        Request::builder()
            .method("GET")
            .uri("/")
            .body(Body::empty())
            .expect("build GET /")
    };

    // client gives up while the first run is still fetching
    let first = tokio::time::timeout(Duration::from_millis(20), app.clone().oneshot(get())).await;
    assert!(first.is_err(), "first request should time out");

    let resp = app.oneshot(get()).await.expect("oneshot GET /");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "OK: 0 new, 0 alerted");

    let sources = ScreenerConfig::default().sources.len();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2 * sources);
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1, "runs overlapped");
}
