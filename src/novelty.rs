// src/novelty.rs
use chrono::{DateTime, FixedOffset};

use crate::fetch::Row;
use crate::snapshot::Snapshot;

/// Split `rows` into already-alerted (dropped) and new (returned, input order
/// kept). New symbols are recorded under `source_id` with timestamp `now`.
/// A symbol repeated within `rows` is reported once.
pub fn detect_new(
    source_id: &str,
    rows: Vec<Row>,
    snapshot: &mut Snapshot,
    now: DateTime<FixedOffset>,
) -> Vec<Row> {
    let seen = snapshot.entries_mut(source_id);
    let mut fresh = Vec::new();
    for row in rows {
        if seen.contains_key(&row.symbol) {
            continue;
        }
        seen.insert(row.symbol.clone(), now);
        tracing::info!(source = source_id, symbol = %row.symbol, "new alert");
        fresh.push(row);
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-01-05T10:15:00+05:30").unwrap()
    }

    fn rows() -> Vec<Row> {
        vec![
            Row::new("AAA", "100", "2%"),
            Row::new("BBB", "50", "-1%"),
            Row::new("CCC", "10", "0.5%"),
        ]
    }

    #[test]
    fn everything_is_new_against_empty_snapshot() {
        let mut snap = Snapshot::new();
        let fresh = detect_new("S", rows(), &mut snap, now());
        let syms: Vec<&str> = fresh.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(syms, vec!["AAA", "BBB", "CCC"]);
        assert_eq!(snap.get("S").unwrap()["BBB"], now());
    }

    #[test]
    fn second_pass_is_empty() {
        let mut snap = Snapshot::new();
        let _ = detect_new("S", rows(), &mut snap, now());
        let again = detect_new("S", rows(), &mut snap, now() + ChronoDuration::minutes(5));
        assert!(again.is_empty());
        // first-seen timestamps are untouched
        assert_eq!(snap.get("S").unwrap()["AAA"], now());
    }

    #[test]
    fn known_symbols_are_dropped_and_order_is_kept() {
        let earlier = now() - ChronoDuration::days(1);
        let mut snap = Snapshot::new();
        snap.entries_mut("S").insert("BBB".into(), earlier);

        let fresh = detect_new("S", rows(), &mut snap, now());
        let syms: Vec<&str> = fresh.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(syms, vec!["AAA", "CCC"]);
        assert_eq!(snap.get("S").unwrap()["BBB"], earlier);
    }

    #[test]
    fn sources_are_tracked_independently() {
        let mut snap = Snapshot::new();
        let _ = detect_new("A", rows(), &mut snap, now());
        let fresh = detect_new("B", rows(), &mut snap, now());
        assert_eq!(fresh.len(), 3);
    }

    #[test]
    fn duplicate_rows_in_one_fetch_alert_once() {
        let mut snap = Snapshot::new();
        let dup = vec![Row::new("AAA", "1", "1%"), Row::new("AAA", "1", "1%")];
        assert_eq!(detect_new("S", dup, &mut snap, now()).len(), 1);
    }
}
