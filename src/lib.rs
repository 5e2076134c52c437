// src/lib.rs
// Public library surface for both binaries and the integration tests.

pub mod api;
pub mod calendar;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod notify;
pub mod novelty;
pub mod observe;
pub mod retry;
pub mod runner;
pub mod snapshot;
pub mod telemetry;

use std::sync::Arc;

pub use crate::calendar::{Clock, TradingCalendar};
pub use crate::config::{AppConfig, ScreenerConfig};
pub use crate::runner::{RunOutcome, Runner};

use crate::fetch::chartink::ChartinkFetcher;
use crate::notify::TelegramNotifier;
use crate::snapshot::SnapshotStore;

/// Wire the production runner: Chartink pages in, Telegram out, JSON state on disk.
pub fn build_runner(app: &AppConfig, screener: ScreenerConfig) -> anyhow::Result<Runner> {
    let calendar = TradingCalendar::from_config(&screener);
    let store = SnapshotStore::new(app.state_path.clone(), calendar);
    let fetcher = ChartinkFetcher::new(screener.fetch_retry)?;
    let notifier = TelegramNotifier::new(&app.credentials, screener.notify_retry);
    Runner::new(screener, store, Arc::new(fetcher), Arc::new(notifier))
}
