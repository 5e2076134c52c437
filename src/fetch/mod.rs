// src/fetch/mod.rs
pub mod chartink;

use anyhow::Result;

/// One screener row. Price and percentage are passed through as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub symbol: String,
    pub price: String,
    pub pct: String,
}

impl Row {
    pub fn new(symbol: impl Into<String>, price: impl Into<String>, pct: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: price.into(),
            pct: pct.into(),
        }
    }
}

/// Symbols must be text: more than one character and not purely numeric
/// (serial-number columns and stray totals look like that).
pub fn is_valid_symbol(symbol: &str) -> bool {
    let s = symbol.trim();
    s.chars().count() > 1 && !s.chars().all(|c| c.is_ascii_digit())
}

/// Turns a screener URL into rows. Implementations retry transient failures
/// internally and return an empty list when they give up; `Err` is reserved
/// for failures the caller should log as a broken source.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<Row>>;
}
