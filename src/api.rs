// src/api.rs
//! Request-triggered host: every hit on `/` performs exactly one run.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::metrics::Metrics;
use crate::runner::{RunOutcome, Runner};

#[derive(Clone)]
pub struct AppState {
    runner: Arc<Runner>,
    // overlapping triggers would race on the state file
    run_gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(runner: Runner) -> Self {
        Self {
            runner: Arc::new(runner),
            run_gate: Arc::new(Mutex::new(())),
        }
    }
}

pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let app = Router::new()
        .route("/", get(trigger_run).post(trigger_run))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    }
}

async fn trigger_run(State(state): State<AppState>) -> (StatusCode, String) {
    let guard = state.run_gate.clone().lock_owned().await;
    let runner = state.runner.clone();

    // Run on its own task so a panic surfaces as a JoinError instead of
    // tearing down the connection. The task owns the gate: a dropped request
    // does not release it before the run is done.
    let run = tokio::spawn(async move {
        let _guard = guard;
        runner.run_once().await
    });
    match run.await {
        Ok(Ok(outcome)) => (StatusCode::OK, summary(&outcome)),
        Ok(Err(e)) => {
            tracing::error!("run failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("run failed: {e}"))
        }
        Err(e) => {
            tracing::error!("run aborted: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "run aborted".to_string())
        }
    }
}

fn summary(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::MarketClosed => "OK: market closed".to_string(),
        RunOutcome::Completed {
            new_symbols,
            alerts_sent,
            ..
        } => format!("OK: {new_symbols} new, {alerts_sent} alerted"),
    }
}
