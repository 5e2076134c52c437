// src/fetch/chartink.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::{header, Client};

use super::{is_valid_symbol, PageFetcher, Row};
use crate::retry::{is_transient, RetryPolicy};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

// Chartink result table: [#, Name, Symbol, Links, % Chg, Price, Volume, ...]
const COL_SYMBOL: usize = 2;
const COL_PCT: usize = 4;
const COL_PRICE: usize = 5;
const MIN_COLS: usize = 6;

/// Fetches a Chartink screener page with a plain HTTP GET and parses the
/// results table out of the returned markup.
///
/// Chartink fills its results table from a script after page load. No
/// script runs here, so a page whose table is only rendered client-side
/// parses to zero rows, which is indistinguishable from "no matches". If a
/// screen never reports anything, serve it through a fetcher that renders
/// the page first (another [`PageFetcher`] implementation).
pub struct ChartinkFetcher {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ChartinkFetcher {
    pub fn new(retry: RetryPolicy) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static(ACCEPT_LANGUAGE),
        );
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("building screener http client")?;
        Ok(Self {
            client,
            timeout: Duration::from_secs(30),
            retry,
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let rsp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .context("screener http get()")?
            .error_for_status()
            .context("screener non-2xx")?;
        rsp.text().await.context("screener http .text()")
    }
}

#[async_trait]
impl PageFetcher for ChartinkFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<Row>> {
        let t0 = std::time::Instant::now();
        let res = self
            .retry
            .run(
                "screener fetch",
                |attempt| {
                    tracing::info!(url, attempt, "loading page");
                    self.fetch_page(url)
                },
                is_transient,
            )
            .await;

        match res {
            Ok(html) => {
                let rows = parse_screener_table(&html);
                histogram!("screener_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                if rows.is_empty() {
                    tracing::warn!(url, "no valid stock rows found on page");
                } else {
                    tracing::info!(url, rows = rows.len(), "fetched symbols");
                }
                Ok(rows)
            }
            Err(e) => {
                tracing::error!(url, "failed to fetch symbols after all retries: {e:#}");
                counter!("screener_fetch_errors_total").increment(1);
                Ok(Vec::new())
            }
        }
    }
}

fn re(cell: &'static OnceCell<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

/// Extract rows from the first `<tbody>` that yields any valid row.
pub fn parse_screener_table(html: &str) -> Vec<Row> {
    static RE_TBODY: OnceCell<Regex> = OnceCell::new();
    static RE_TR: OnceCell<Regex> = OnceCell::new();
    static RE_TD: OnceCell<Regex> = OnceCell::new();
    let re_tbody = re(&RE_TBODY, r"(?is)<tbody[^>]*>(.*?)</tbody>");
    let re_tr = re(&RE_TR, r"(?is)<tr[^>]*>(.*?)</tr>");
    let re_td = re(&RE_TD, r"(?is)<td[^>]*>(.*?)</td>");

    for (idx, tbody) in re_tbody.captures_iter(html).enumerate() {
        let mut rows = Vec::new();
        for tr in re_tr.captures_iter(&tbody[1]) {
            let cells: Vec<String> = re_td
                .captures_iter(&tr[1])
                .map(|c| cell_text(&c[1]))
                .collect();
            if cells.len() < MIN_COLS {
                continue;
            }
            let symbol = &cells[COL_SYMBOL];
            if !is_valid_symbol(symbol) {
                tracing::debug!(table = idx + 1, "skipping row with symbol {symbol:?}");
                continue;
            }
            rows.push(Row::new(
                symbol.clone(),
                cells[COL_PRICE].clone(),
                cells[COL_PCT].clone(),
            ));
        }
        if !rows.is_empty() {
            tracing::debug!(table = idx + 1, rows = rows.len(), "parsed screener table");
            return rows;
        }
    }
    Vec::new()
}

/// Visible text of a table cell: tags stripped, entities decoded, whitespace collapsed.
fn cell_text(raw: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let stripped = re(&RE_TAGS, r"(?is)</?[^>]+>").replace_all(raw, "");
    let decoded = html_escape::decode_html_entities(&stripped).to_string();
    re(&RE_WS, r"\s+")
        .replace_all(&decoded, " ")
        .trim()
        .to_string()
}
