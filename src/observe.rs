// src/observe.rs
//! Typed run events. The runner reports through a `RunObserver` rather than
//! logging directly, so tests can assert on what happened.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::calendar::ClosedReason;
use crate::snapshot::SaveOutcome;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    MarketClosed {
        reason: ClosedReason,
    },
    StateLoaded {
        symbols: usize,
        pruned: usize,
    },
    SourceFetched {
        source: String,
        rows: usize,
    },
    SourceFailed {
        source: String,
        error: String,
    },
    NewSymbols {
        source: String,
        count: usize,
    },
    NothingNew {
        group: String,
    },
    AlertSent {
        group: String,
        rows: usize,
    },
    AlertFailed {
        group: String,
        rows: usize,
    },
    StateSaved {
        outcome: SaveOutcome,
    },
    RunCompleted {
        new_symbols: usize,
        alerts_sent: usize,
    },
}

pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("screener_runs_total", "Runs that passed the session gate.");
        describe_counter!("screener_closed_total", "Runs skipped because the market was closed.");
        describe_counter!("screener_new_symbols_total", "Symbols seen for the first time.");
        describe_counter!("screener_alerts_sent_total", "Rows delivered in alert messages.");
        describe_counter!("screener_fetch_errors_total", "Screener fetch failures.");
        describe_counter!("screener_notify_failures_total", "Alert messages not delivered.");
        describe_histogram!("screener_fetch_ms", "Screener page fetch time in milliseconds.");
        describe_gauge!("screener_last_run_ts", "Unix ts when a run last completed.");
    });
}

/// Production observer: structured logs plus metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_event(&self, event: &RunEvent) {
        ensure_metrics_described();
        match event {
            RunEvent::MarketClosed { reason } => {
                counter!("screener_closed_total").increment(1);
                tracing::info!("market closed: {reason}, skipping run");
            }
            RunEvent::StateLoaded { symbols, pruned } => {
                counter!("screener_runs_total").increment(1);
                tracing::info!(symbols, pruned, "state prepared");
            }
            RunEvent::SourceFetched { source, rows } => {
                tracing::info!(source = %source, rows, "source fetched");
            }
            RunEvent::SourceFailed { source, error } => {
                counter!("screener_fetch_errors_total").increment(1);
                tracing::error!(source = %source, "fetch failed: {error}");
            }
            RunEvent::NewSymbols { source, count } => {
                counter!("screener_new_symbols_total").increment(*count as u64);
                tracing::info!(source = %source, count, "new symbols");
            }
            RunEvent::NothingNew { group } => {
                tracing::info!(group = %group, "no new alerts");
            }
            RunEvent::AlertSent { group, rows } => {
                counter!("screener_alerts_sent_total").increment(*rows as u64);
                tracing::info!(group = %group, rows, "alert sent");
            }
            RunEvent::AlertFailed { group, rows } => {
                tracing::error!(group = %group, rows, "alert not delivered, symbols stay marked as seen");
            }
            RunEvent::StateSaved { outcome } => {
                tracing::debug!(?outcome, "state persisted");
            }
            RunEvent::RunCompleted {
                new_symbols,
                alerts_sent,
            } => {
                gauge!("screener_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
                tracing::info!(new_symbols, alerts_sent, "run completed");
            }
        }
    }
}
