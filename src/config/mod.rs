// src/config/mod.rs
pub mod sources;

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use crate::retry::RetryPolicy;
pub use sources::{SignalKind, Source};

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
pub const ENV_STATE_FILE: &str = "STATE_FILE";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
/// `SCREENER_URL_<SOURCE_ID>` replaces the compiled-in URL of that source.
pub const ENV_URL_PREFIX: &str = "SCREENER_URL_";
pub const DEFAULT_STATE_FILE: &str = "state.json";

/// IST has no daylight saving, so a fixed +05:30 offset is exact.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Telegram destination. Both values are mandatory.
#[derive(Clone)]
pub struct Credentials {
    pub bot_token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print the token
        f.debug_struct("Credentials")
            .field("bot_token_len", &self.bot_token.len())
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        let bot_token = required_env(ENV_BOT_TOKEN)?;
        let chat_id = required_env(ENV_CHAT_ID)?;
        Ok(Self { bot_token, chat_id })
    }
}

fn required_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Ok(_) => bail!("{key} is set but empty"),
        Err(_) => bail!("Missing {key} env var"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var(ENV_LOG_FORMAT) {
            Ok(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Process-level settings read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub state_path: PathBuf,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let credentials = Credentials::from_env()?;
        let state_path = std::env::var(ENV_STATE_FILE)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE));
        Ok(Self {
            credentials,
            state_path,
            log_format: LogFormat::from_env(),
        })
    }
}

/// Session window, both ends inclusive, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            open: hm(9, 20),
            close: hm(15, 25),
        }
    }
}

/// Everything a run needs besides credentials. Compiled-in defaults;
/// tests build their own.
#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    pub timezone: FixedOffset,
    pub market_hours: MarketHours,
    pub holidays: Vec<NaiveDate>,
    pub retention: ChronoDuration,
    pub fetch_retry: RetryPolicy,
    pub notify_retry: RetryPolicy,
    pub sources: Vec<Source>,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            timezone: ist(),
            market_hours: MarketHours::default(),
            holidays: nse_holidays_2026(),
            retention: ChronoDuration::days(7),
            fetch_retry: RetryPolicy::default(),
            notify_retry: RetryPolicy::default(),
            sources: sources::default_sources(),
        }
    }
}

impl ScreenerConfig {
    /// Compiled-in defaults with per-source URL overrides from the environment.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.override_urls(|key| std::env::var(key).ok());
        cfg
    }

    /// Replace source URLs for which `lookup("SCREENER_URL_<ID>")` yields a
    /// non-blank value. Returns how many were replaced.
    pub fn override_urls(&mut self, lookup: impl Fn(&str) -> Option<String>) -> usize {
        let mut replaced = 0;
        for source in &mut self.sources {
            let key = format!("{ENV_URL_PREFIX}{}", source.id.to_ascii_uppercase());
            let Some(url) = lookup(&key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
            else {
                continue;
            };
            tracing::info!(source = %source.id, %url, "screen url overridden");
            source.url = url;
            replaced += 1;
        }
        replaced
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("no screener sources configured");
        }
        if self.market_hours.open >= self.market_hours.close {
            bail!(
                "market open {} must be before close {}",
                self.market_hours.open,
                self.market_hours.close
            );
        }
        if self.retention < ChronoDuration::zero() {
            bail!("retention window must not be negative");
        }
        let mut seen = HashSet::new();
        for s in &self.sources {
            if s.id.trim().is_empty() {
                bail!("source with empty id (url {})", s.url);
            }
            if !seen.insert(s.id.as_str()) {
                bail!("duplicate source id {}", s.id);
            }
        }
        Ok(())
    }

    /// Sources bundled by group key, groups in first-appearance order,
    /// members in configured order.
    pub fn groups(&self) -> Vec<(&str, Vec<&Source>)> {
        let mut out: Vec<(&str, Vec<&Source>)> = Vec::new();
        for s in &self.sources {
            match out.iter_mut().find(|(g, _)| *g == s.group) {
                Some((_, members)) => members.push(s),
                None => out.push((s.group.as_str(), vec![s])),
            }
        }
        out
    }
}

pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or(Utc.fix())
}

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
}

/// NSE trading holidays for 2026 (weekday closures only).
pub fn nse_holidays_2026() -> Vec<NaiveDate> {
    [
        (1, 26),  // Republic Day
        (3, 3),   // Holi
        (3, 26),  // Shri Ram Navami
        (3, 31),  // Shri Mahavir Jayanti
        (4, 3),   // Good Friday
        (4, 14),  // Dr. Baba Saheb Ambedkar Jayanti
        (5, 1),   // Maharashtra Day
        (5, 28),  // Bakri Id
        (6, 26),  // Muharram
        (9, 14),  // Ganesh Chaturthi
        (10, 2),  // Mahatma Gandhi Jayanti
        (10, 20), // Dussehra
        (11, 10), // Diwali-Balipratipada
        (11, 24), // Prakash Gurpurb Sri Guru Nanak Dev
        (12, 25), // Christmas
    ]
    .into_iter()
    .filter_map(|(m, d)| NaiveDate::from_ymd_opt(2026, m, d))
    .collect()
}
