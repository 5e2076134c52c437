// src/config/sources.rs
/// Which flavour of signal a screener reports. Ordering drives the
/// order of sub-sections in an alert message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignalKind {
    Touch,
    Reversal,
}

impl SignalKind {
    pub fn label(self) -> &'static str {
        match self {
            SignalKind::Touch => "Touch",
            SignalKind::Reversal => "Reversal",
        }
    }
}

/// One screener feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Snapshot key, e.g. `EMA20_TOUCH`.
    pub id: String,
    pub url: String,
    pub label: String,
    /// Sources sharing a group are reported in one message.
    pub group: String,
    pub kind: SignalKind,
}

impl Source {
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        label: impl Into<String>,
        group: impl Into<String>,
        kind: SignalKind,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            label: label.into(),
            group: group.into(),
            kind,
        }
    }
}

const CHARTINK: &str = "https://chartink.com/screener";

/// EMA20/50/200, each as a touch and a reversal screen.
///
/// Only the reversal slugs are known public Chartink screens. The touch slugs
/// are placeholders following the same naming and may not exist; point them
/// at real screens with `SCREENER_URL_EMA{20,50,200}_TOUCH`. A missing screen
/// only costs its own rows, the paired reversal screen still reports.
pub fn default_sources() -> Vec<Source> {
    let mut out = Vec::with_capacity(6);
    for (period, touch_slug, reversal_slug) in [
        (
            20,
            "stocks-touching-20-day-ema",
            "stocks-are-touching-20-day-ema-and-reversing",
        ),
        (
            50,
            "stocks-touching-50-day-ema",
            "stocks-are-touching-50-day-ema-and-reversing-2",
        ),
        (
            200,
            "stocks-touching-200-day-ema",
            "stocks-are-touching-200-day-ema-and-reversing",
        ),
    ] {
        let group = format!("EMA{period}");
        out.push(Source::new(
            format!("{group}_TOUCH"),
            format!("{CHARTINK}/{touch_slug}"),
            format!("{period} EMA touch"),
            group.clone(),
            SignalKind::Touch,
        ));
        out.push(Source::new(
            format!("{group}_REVERSAL"),
            format!("{CHARTINK}/{reversal_slug}"),
            format!("{period} EMA touch & reversal"),
            group,
            SignalKind::Reversal,
        ));
    }
    out
}
