// src/runner.rs
//! One pass: gate on the session, load and prune state, fetch and diff each
//! source, send one message per group, persist.
//!
//! New symbols are committed to the snapshot before the send is attempted,
//! so a message that fails to deliver is not retried on the next run
//! (at most one alert per symbol). Only one run may touch a state file at a
//! time; callers must serialize runs.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::calendar::{Clock, SessionStatus, SystemClock, TradingCalendar};
use crate::config::ScreenerConfig;
use crate::fetch::PageFetcher;
use crate::notify::{compose_group_message, AlertBatch, Notifier};
use crate::novelty::detect_new;
use crate::observe::{RunEvent, RunObserver, TracingObserver};
use crate::snapshot::{prune, SaveOutcome, SnapshotStore};

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    MarketClosed,
    Completed {
        new_symbols: usize,
        alerts_sent: usize,
        groups_notified: Vec<String>,
        saved: SaveOutcome,
    },
}

pub struct Runner {
    config: ScreenerConfig,
    calendar: TradingCalendar,
    store: SnapshotStore,
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
    observer: Arc<dyn RunObserver>,
    clock: Arc<dyn Clock>,
}

impl Runner {
    /// Fails on an unusable configuration.
    pub fn new(
        config: ScreenerConfig,
        store: SnapshotStore,
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        let calendar = TradingCalendar::from_config(&config);
        Ok(Self {
            config,
            calendar,
            store,
            fetcher,
            notifier,
            observer: Arc::new(TracingObserver),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run_once(&self) -> Result<RunOutcome> {
        self.run_at(self.clock.now()).await
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome> {
        if let SessionStatus::Closed(reason) = self.calendar.status(now) {
            self.emit(RunEvent::MarketClosed { reason });
            return Ok(RunOutcome::MarketClosed);
        }

        let local_now = self.calendar.local(now);
        let mut snapshot = self.store.load().await;
        let pruned = prune(&mut snapshot, now, self.config.retention);
        self.emit(RunEvent::StateLoaded {
            symbols: snapshot.symbol_count(),
            pruned,
        });

        let mut new_symbols = 0usize;
        let mut alerts_sent = 0usize;
        let mut groups_notified = Vec::new();

        for (group, members) in self.config.groups() {
            let mut batch = AlertBatch::new();
            for source in members {
                tracing::debug!(source = %source.id, label = %source.label, "processing screen");
                let rows = match self.fetcher.fetch(&source.url).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        self.emit(RunEvent::SourceFailed {
                            source: source.id.clone(),
                            error: format!("{e:#}"),
                        });
                        continue;
                    }
                };
                self.emit(RunEvent::SourceFetched {
                    source: source.id.clone(),
                    rows: rows.len(),
                });

                let fresh = detect_new(&source.id, rows, &mut snapshot, local_now);
                if !fresh.is_empty() {
                    new_symbols += fresh.len();
                    self.emit(RunEvent::NewSymbols {
                        source: source.id.clone(),
                        count: fresh.len(),
                    });
                }
                batch.extend(source.kind, fresh);
            }

            let Some(message) = compose_group_message(group, &batch, local_now) else {
                self.emit(RunEvent::NothingNew {
                    group: group.to_string(),
                });
                continue;
            };

            let rows = batch.row_count();
            if self.notifier.send(&message).await {
                alerts_sent += rows;
                groups_notified.push(group.to_string());
                self.emit(RunEvent::AlertSent {
                    group: group.to_string(),
                    rows,
                });
            } else {
                self.emit(RunEvent::AlertFailed {
                    group: group.to_string(),
                    rows,
                });
            }
        }

        let saved = self.store.save(&snapshot, now).await;
        self.emit(RunEvent::StateSaved { outcome: saved });
        self.emit(RunEvent::RunCompleted {
            new_symbols,
            alerts_sent,
        });

        Ok(RunOutcome::Completed {
            new_symbols,
            alerts_sent,
            groups_notified,
            saved,
        })
    }

    fn emit(&self, event: RunEvent) {
        self.observer.on_event(&event);
    }
}
