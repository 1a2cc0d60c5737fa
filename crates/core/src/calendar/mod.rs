//! Market calendar.
//!
//! Decides whether a timestamp is a valid moment for a given capture. Pure:
//! no clock reads, no I/O. Anything the calendar cannot vouch for (weekend,
//! holiday, a year without holiday data) is treated as non-trading.

mod holidays;

pub use holidays::us_exchange_holidays;

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a calendar from configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Unknown time zone: {0}")]
    UnknownTimezone(String),

    #[error("Session open {open} is not before close {close}")]
    EmptySession { open: NaiveTime, close: NaiveTime },

    #[error("Opening window [{start}, {end}] is empty")]
    EmptyOpeningWindow { start: NaiveTime, end: NaiveTime },

    #[error("Capture window runs past midnight: {0}")]
    WindowPastMidnight(String),

    #[error("No holiday entries configured")]
    NoHolidays,
}

/// Which part of the session a capture needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionWindow {
    /// Any time on a trading day
    TradingDay,
    /// Shortly after the open
    Opening,
    /// After the close, while end-of-day data settles
    Closing,
    /// While the session is running: [open, close)
    Intraday,
}

/// Why a timestamp is not a trading moment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    Weekend { date: NaiveDate },
    Holiday { date: NaiveDate },
    /// The holiday set has no entries for this year.
    UncoveredYear { year: i32 },
    OutsideWindow { window: SessionWindow, local_time: NaiveTime },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Weekend { date } => write!(f, "{} is a weekend", date),
            SkipReason::Holiday { date } => write!(f, "{} is a market holiday", date),
            SkipReason::UncoveredYear { year } => {
                write!(f, "no holiday calendar for {}", year)
            }
            SkipReason::OutsideWindow { window, local_time } => {
                write!(f, "{} is outside the {:?} window", local_time, window)
            }
        }
    }
}

/// Calendar settings as read from configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct CalendarConfig {
    /// IANA zone of the exchange
    pub timezone: String,
    pub session_open: NaiveTime,
    pub session_close: NaiveTime,
    pub holidays: Vec<NaiveDate>,
    /// Opening capture starts this many minutes after the open
    pub opening_delay_mins: u32,
    /// Opening capture is accepted until this many minutes after the open
    pub opening_window_mins: u32,
    /// Closing capture starts this many minutes after the close
    pub closing_delay_mins: u32,
    /// Closing capture is accepted until this many minutes after the close
    pub closing_window_mins: u32,
    /// Treat years absent from `holidays` as ordinary years
    pub allow_uncovered_years: bool,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            session_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            session_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            holidays: us_exchange_holidays(),
            opening_delay_mins: 5,
            opening_window_mins: 30,
            closing_delay_mins: 5,
            closing_window_mins: 120,
            allow_uncovered_years: false,
        }
    }
}

/// Validated exchange calendar.
#[derive(Clone, Debug)]
pub struct MarketCalendar {
    tz: Tz,
    open: NaiveTime,
    close: NaiveTime,
    opening: (NaiveTime, NaiveTime),
    closing: (NaiveTime, NaiveTime),
    holidays: HashSet<NaiveDate>,
    covered_years: BTreeSet<i32>,
    allow_uncovered_years: bool,
}

fn offset(base: NaiveTime, minutes: u32, label: &str) -> Result<NaiveTime, CalendarError> {
    let (time, wrapped) = base.overflowing_add_signed(Duration::minutes(i64::from(minutes)));
    if wrapped != 0 {
        return Err(CalendarError::WindowPastMidnight(format!(
            "{} = {} + {}m",
            label, base, minutes
        )));
    }
    Ok(time)
}

impl MarketCalendar {
    /// Validate a configuration and build the calendar.
    pub fn from_config(config: &CalendarConfig) -> Result<Self, CalendarError> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_| CalendarError::UnknownTimezone(config.timezone.clone()))?;

        if config.session_open >= config.session_close {
            return Err(CalendarError::EmptySession {
                open: config.session_open,
                close: config.session_close,
            });
        }

        let opening = (
            offset(config.session_open, config.opening_delay_mins, "opening start")?,
            offset(config.session_open, config.opening_window_mins, "opening end")?,
        );
        if opening.0 > opening.1 {
            return Err(CalendarError::EmptyOpeningWindow {
                start: opening.0,
                end: opening.1,
            });
        }

        let closing = (
            offset(config.session_close, config.closing_delay_mins, "closing start")?,
            offset(
                config.session_close,
                config.closing_window_mins.max(config.closing_delay_mins),
                "closing end",
            )?,
        );

        if config.holidays.is_empty() && !config.allow_uncovered_years {
            return Err(CalendarError::NoHolidays);
        }

        Ok(Self {
            tz,
            open: config.session_open,
            close: config.session_close,
            opening,
            closing,
            holidays: config.holidays.iter().copied().collect(),
            covered_years: config.holidays.iter().map(|d| d.year()).collect(),
            allow_uncovered_years: config.allow_uncovered_years,
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn session_open(&self) -> NaiveTime {
        self.open
    }

    pub fn session_close(&self) -> NaiveTime {
        self.close
    }

    /// Local start of the opening capture window.
    pub fn opening_start(&self) -> NaiveTime {
        self.opening.0
    }

    /// Local start of the closing capture window.
    pub fn closing_start(&self) -> NaiveTime {
        self.closing.0
    }

    /// Exchange-local wall clock for an instant.
    pub fn local_datetime(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.tz).naive_local()
    }

    /// Exchange trading date for an instant.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local_datetime(at).date()
    }

    /// Instant of a local wall-clock time, if it exists on that date.
    pub fn at_local(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Why `date` is not a trading day, if it is not.
    pub fn day_skip_reason(&self, date: NaiveDate) -> Option<SkipReason> {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Some(SkipReason::Weekend { date });
        }
        if !self.allow_uncovered_years && !self.covered_years.contains(&date.year()) {
            return Some(SkipReason::UncoveredYear { year: date.year() });
        }
        if self.holidays.contains(&date) {
            return Some(SkipReason::Holiday { date });
        }
        None
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.day_skip_reason(date).is_none()
    }

    /// Why `at` is not valid for `window`, if it is not.
    pub fn skip_reason(&self, at: DateTime<Utc>, window: SessionWindow) -> Option<SkipReason> {
        let local = self.local_datetime(at);
        if let Some(reason) = self.day_skip_reason(local.date()) {
            return Some(reason);
        }

        let t = local.time();
        let inside = match window {
            SessionWindow::TradingDay => true,
            SessionWindow::Intraday => t >= self.open && t < self.close,
            SessionWindow::Opening => t >= self.opening.0 && t <= self.opening.1,
            SessionWindow::Closing => t >= self.closing.0 && t <= self.closing.1,
        };

        (!inside).then_some(SkipReason::OutsideWindow {
            window,
            local_time: t,
        })
    }

    /// Whether `at` is a valid moment for a capture of type `window`.
    pub fn is_trading_moment(&self, at: DateTime<Utc>, window: SessionWindow) -> bool {
        self.skip_reason(at, window).is_none()
    }
}
