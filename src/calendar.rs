// src/calendar.rs
//! Trading session gate for the NSE cash market.
//!
//! Pure functions of wall-clock time in a fixed timezone. Time-of-day checks
//! use minute resolution: a run triggered at 15:25:40 still counts as "at
//! close", so a scheduler firing every few minutes reliably hits the final run.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc, Weekday};

use crate::config::{MarketHours, ScreenerConfig};

/// Source of "now". Injected so tests can pin the run time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    Weekend(Weekday),
    Holiday(NaiveDate),
    BeforeOpen { opens: NaiveTime },
    AfterClose { closed: NaiveTime },
}

impl fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosedReason::Weekend(day) => write!(f, "weekend ({day})"),
            ClosedReason::Holiday(date) => {
                write!(f, "trading holiday ({})", date.format("%d-%b-%Y"))
            }
            ClosedReason::BeforeOpen { opens } => {
                write!(f, "before market hours (opens at {})", opens.format("%H:%M"))
            }
            ClosedReason::AfterClose { closed } => {
                write!(f, "after market hours (closed at {})", closed.format("%H:%M"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Open,
    Closed(ClosedReason),
}

#[derive(Debug, Clone)]
pub struct TradingCalendar {
    timezone: FixedOffset,
    hours: MarketHours,
    holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(
        timezone: FixedOffset,
        hours: MarketHours,
        holidays: impl IntoIterator<Item = NaiveDate>,
    ) -> Self {
        Self {
            timezone,
            hours,
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn from_config(cfg: &ScreenerConfig) -> Self {
        Self::new(cfg.timezone, cfg.market_hours, cfg.holidays.iter().copied())
    }

    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    /// `now` expressed in the exchange timezone.
    pub fn local(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        now.with_timezone(&self.timezone)
    }

    pub fn status(&self, now: DateTime<Utc>) -> SessionStatus {
        let local = self.local(now);
        let day = local.weekday();
        if matches!(day, Weekday::Sat | Weekday::Sun) {
            return SessionStatus::Closed(ClosedReason::Weekend(day));
        }
        let date = local.date_naive();
        if self.holidays.contains(&date) {
            return SessionStatus::Closed(ClosedReason::Holiday(date));
        }
        let t = minute_of(&local);
        if t < self.hours.open {
            return SessionStatus::Closed(ClosedReason::BeforeOpen {
                opens: self.hours.open,
            });
        }
        if t > self.hours.close {
            return SessionStatus::Closed(ClosedReason::AfterClose {
                closed: self.hours.close,
            });
        }
        SessionStatus::Open
    }

    pub fn is_session_open(&self, now: DateTime<Utc>) -> bool {
        self.status(now) == SessionStatus::Open
    }

    /// True once the local time of day reaches the close boundary.
    pub fn is_final_session_run(&self, now: DateTime<Utc>) -> bool {
        minute_of(&self.local(now)) >= self.hours.close
    }
}

fn minute_of(local: &DateTime<FixedOffset>) -> NaiveTime {
    NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).unwrap_or(NaiveTime::MIN)
}
