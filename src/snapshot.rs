// src/snapshot.rs
//! Persisted "already alerted" state: source id -> {symbol -> first seen}.
//!
//! On disk this is a flat JSON object. Older deployments wrote a plain array
//! of symbols per source; those are migrated to an empty entry set while
//! decoding and never seen again downstream.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::calendar::TradingCalendar;

/// Symbol -> timestamp of the run that first surfaced it.
pub type EntrySet = BTreeMap<String, DateTime<FixedOffset>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    sources: BTreeMap<String, EntrySet>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.values().all(|s| s.is_empty())
    }

    pub fn get(&self, source_id: &str) -> Option<&EntrySet> {
        self.sources.get(source_id)
    }

    /// Entry set for `source_id`, created empty if absent.
    pub fn entries_mut(&mut self, source_id: &str) -> &mut EntrySet {
        self.sources.entry(source_id.to_string()).or_default()
    }

    pub fn contains(&self, source_id: &str, symbol: &str) -> bool {
        self.sources
            .get(source_id)
            .is_some_and(|s| s.contains_key(symbol))
    }

    pub fn symbol_count(&self) -> usize {
        self.sources.values().map(|s| s.len()).sum()
    }
}

/// Shape of one source's value as found on disk.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntries {
    Timestamped(BTreeMap<String, String>),
    Legacy(Vec<String>),
    Unknown(serde_json::Value),
}

/// Decode the state file body. Legacy list entries and unparseable
/// timestamps are dropped (logged), never fatal.
pub fn decode_snapshot(body: &str) -> Result<Snapshot> {
    let raw: BTreeMap<String, StoredEntries> =
        serde_json::from_str(body).context("state file is not a JSON object")?;

    let mut snap = Snapshot::new();
    for (source_id, stored) in raw {
        let set = match stored {
            StoredEntries::Timestamped(map) => {
                let mut set = EntrySet::new();
                for (symbol, ts) in map {
                    match DateTime::parse_from_rfc3339(&ts) {
                        Ok(t) => {
                            set.insert(symbol, t);
                        }
                        Err(e) => tracing::debug!(
                            source = %source_id,
                            symbol = %symbol,
                            "dropping entry with bad timestamp {ts:?}: {e}"
                        ),
                    }
                }
                set
            }
            StoredEntries::Legacy(symbols) => {
                tracing::info!(
                    source = %source_id,
                    dropped = symbols.len(),
                    "migrating legacy list entry to empty set"
                );
                EntrySet::new()
            }
            StoredEntries::Unknown(v) => {
                tracing::warn!(source = %source_id, "unexpected state value {v}, resetting");
                EntrySet::new()
            }
        };
        snap.sources.insert(source_id, set);
    }
    Ok(snap)
}

/// Drop entries first seen before `now - retention`. Entries exactly at the
/// cutoff are kept. Returns how many were removed.
pub fn prune(snapshot: &mut Snapshot, now: DateTime<Utc>, retention: ChronoDuration) -> usize {
    let cutoff = now - retention;
    let mut removed = 0usize;
    for set in snapshot.sources.values_mut() {
        let before = set.len();
        set.retain(|_, seen| *seen >= cutoff);
        removed += before - set.len();
    }
    removed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Final run of the day: an empty snapshot was written instead.
    Reset,
    Failed,
}

/// JSON file store. Read-modify-write without locking: at most one run may
/// use a given path at a time.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    calendar: TradingCalendar,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>, calendar: TradingCalendar) -> Self {
        Self {
            path: path.into(),
            calendar,
        }
    }

    /// Missing or unreadable state yields an empty snapshot.
    pub async fn load(&self) -> Snapshot {
        let body = match fs::read_to_string(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "no state file yet, starting empty");
                return Snapshot::new();
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), "failed to read state: {e:#}");
                return Snapshot::new();
            }
        };
        match decode_snapshot(&body) {
            Ok(s) => {
                tracing::debug!(symbols = s.symbol_count(), "state loaded");
                s
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), "failed to parse state: {e:#}");
                Snapshot::new()
            }
        }
    }

    /// Persist `snapshot`, or an empty one on the final run of the session.
    /// Failures are logged, not returned.
    pub async fn save(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> SaveOutcome {
        let reset = self.calendar.is_final_session_run(now);
        let empty = Snapshot::new();
        let to_write = if reset { &empty } else { snapshot };

        match self.write(to_write).await {
            Ok(()) if reset => {
                tracing::info!("end of session, state reset");
                SaveOutcome::Reset
            }
            Ok(()) => {
                tracing::info!(symbols = to_write.symbol_count(), "state saved");
                SaveOutcome::Saved
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), "failed to save state: {e:#}");
                SaveOutcome::Failed
            }
        }
    }

    async fn write(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(snapshot).context("serializing state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}
