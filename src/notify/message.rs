// src/notify/message.rs
use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use html_escape::encode_text;

use crate::config::SignalKind;
use crate::fetch::Row;

/// New rows of one group, bucketed by signal kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertBatch {
    buckets: BTreeMap<SignalKind, Vec<Row>>,
}

impl AlertBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, kind: SignalKind, rows: Vec<Row>) {
        if rows.is_empty() {
            return;
        }
        self.buckets.entry(kind).or_default().extend(rows);
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(|v| v.is_empty())
    }

    pub fn row_count(&self) -> usize {
        self.buckets.values().map(|v| v.len()).sum()
    }

    pub fn rows(&self, kind: SignalKind) -> &[Row] {
        self.buckets.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Telegram HTML message for one group, or `None` when nothing is new.
///
/// ```text
/// 📊 <b>EMA20 Alert</b>
/// 🕒 10:15
///
/// <b>Touch</b>
/// <b>AAA</b> | ₹100 | 2%
/// ```
pub fn compose_group_message(
    group: &str,
    batch: &AlertBatch,
    run_time: DateTime<FixedOffset>,
) -> Option<String> {
    if batch.is_empty() {
        return None;
    }
    let mut msg = format!(
        "📊 <b>{} Alert</b>\n🕒 {}\n",
        encode_text(group),
        run_time.format("%H:%M")
    );
    for (kind, rows) in &batch.buckets {
        if rows.is_empty() {
            continue;
        }
        msg.push_str(&format!("\n<b>{}</b>\n", kind.label()));
        for r in rows {
            msg.push_str(&format!(
                "<b>{}</b> | ₹{} | {}\n",
                encode_text(&r.symbol),
                encode_text(&r.price),
                encode_text(&r.pct)
            ));
        }
    }
    Some(msg)
}

/// Telegram refuses texts longer than this (UTF-16 code units).
pub const TELEGRAM_MAX_LEN: usize = 4096;

fn text_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Break a composed message into parts of at most `limit` units, cutting only
/// at line ends so markup stays balanced. Every part repeats the header (the
/// lines before the first blank line), and a part that starts mid-section
/// repeats that section's title. A single line longer than `limit` is sent
/// alone rather than cut.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text_len(text) <= limit {
        return vec![text.to_string()];
    }
    let (header, body) = match text.split_once("\n\n") {
        Some((h, b)) => (format!("{h}\n"), b),
        None => (String::new(), text),
    };

    let mut parts = Vec::new();
    let mut current = header.clone();
    let mut section: Option<&str> = None;
    let mut after_blank = true;
    for line in body.lines() {
        let is_title = after_blank && !line.is_empty();
        after_blank = line.is_empty();
        if is_title {
            section = Some(line);
        }

        let fresh = current.len() == header.len();
        if !fresh && text_len(&current) + text_len(line) + 1 > limit {
            let done = std::mem::replace(&mut current, header.clone());
            parts.push(format!("{}\n", done.trim_end_matches('\n')));
        }
        if current.len() == header.len() {
            if line.is_empty() {
                continue;
            }
            if !header.is_empty() {
                current.push('\n');
            }
            if let (false, Some(title)) = (is_title, section) {
                current.push_str(title);
                current.push('\n');
            }
        }
        current.push_str(line);
        current.push('\n');
    }
    if current.len() > header.len() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-01-05T10:15:42+05:30").unwrap()
    }

    #[test]
    fn empty_batch_has_no_message() {
        assert_eq!(compose_group_message("EMA20", &AlertBatch::new(), at()), None);
    }

    #[test]
    fn sections_follow_kind_order() {
        let mut b = AlertBatch::new();
        b.extend(SignalKind::Reversal, vec![Row::new("BBB", "50", "-1%")]);
        b.extend(SignalKind::Touch, vec![Row::new("AAA", "100", "2%")]);
        b.extend(SignalKind::Touch, vec![]);

        let msg = compose_group_message("EMA20", &b, at()).unwrap();
        assert_eq!(
            msg,
            "📊 <b>EMA20 Alert</b>\n🕒 10:15\n\
             \n<b>Touch</b>\n<b>AAA</b> | ₹100 | 2%\n\
             \n<b>Reversal</b>\n<b>BBB</b> | ₹50 | -1%\n"
        );
        assert_eq!(b.row_count(), 2);
        assert_eq!(b.rows(SignalKind::Touch), &[Row::new("AAA", "100", "2%")]);
    }

    #[test]
    fn empty_kind_section_is_omitted() {
        let mut b = AlertBatch::new();
        b.extend(SignalKind::Reversal, vec![Row::new("BBB", "50", "-1%")]);
        let msg = compose_group_message("EMA50", &b, at()).unwrap();
        assert!(!msg.contains("Touch"));
        assert!(msg.contains("<b>Reversal</b>"));
    }

    #[test]
    fn interpolated_values_are_escaped() {
        let mut b = AlertBatch::new();
        b.extend(SignalKind::Touch, vec![Row::new("M&M", "<1>", "5%")]);
        let msg = compose_group_message("A<B", &b, at()).unwrap();
        assert!(msg.contains("<b>A&lt;B Alert</b>"));
        assert!(msg.contains("<b>M&amp;M</b> | ₹&lt;1&gt; | 5%"));
    }

    #[test]
    fn short_message_is_not_split() {
        let mut b = AlertBatch::new();
        b.extend(SignalKind::Touch, vec![Row::new("AAA", "100", "2%")]);
        let msg = compose_group_message("EMA20", &b, at()).unwrap();
        assert_eq!(split_message(&msg, TELEGRAM_MAX_LEN), vec![msg]);
    }

    #[test]
    fn long_group_is_split_at_line_ends() {
        let mut b = AlertBatch::new();
        let touch: Vec<Row> = (0..300)
            .map(|i| Row::new(format!("TOUCH{i:03}"), "1,234.50", "+1.25%"))
            .collect();
        let reversal: Vec<Row> = (0..300)
            .map(|i| Row::new(format!("REV{i:03}"), "99.95", "-0.40%"))
            .collect();
        b.extend(SignalKind::Touch, touch);
        b.extend(SignalKind::Reversal, reversal);
        let msg = compose_group_message("EMA200", &b, at()).unwrap();
        assert!(text_len(&msg) > TELEGRAM_MAX_LEN);

        let parts = split_message(&msg, TELEGRAM_MAX_LEN);
        assert!(parts.len() > 1);
        let header = "📊 <b>EMA200 Alert</b>\n🕒 10:15\n";
        let mut rows = 0;
        for part in &parts {
            assert!(text_len(part) <= TELEGRAM_MAX_LEN);
            assert!(part.starts_with(header));
            // rows never appear without their section title
            let body = &part[header.len()..];
            assert!(
                body.starts_with("\n<b>Touch</b>\n") || body.starts_with("\n<b>Reversal</b>\n"),
                "part body starts with {:?}",
                &body[..body.len().min(40)]
            );
            rows += part.lines().filter(|l| l.contains(" | ")).count();
        }
        assert_eq!(rows, 600);
        assert!(parts.iter().any(|p| p.contains("<b>TOUCH299</b>")));
        assert!(parts.iter().any(|p| p.contains("<b>REV000</b>")));
    }

    #[test]
    fn split_keeps_every_line_once() {
        let text = "head\n\n<b>T</b>\nr1\nr2\nr3\n\n<b>R</b>\nr4\n";
        let parts = split_message(text, 18);
        assert_eq!(
            parts,
            vec![
                "head\n\n<b>T</b>\nr1\n",
                "head\n\n<b>T</b>\nr2\n",
                "head\n\n<b>T</b>\nr3\n",
                "head\n\n<b>R</b>\nr4\n",
            ]
        );
    }
}
