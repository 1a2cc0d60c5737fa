//! Stored market data rows.
//!
//! Three row shapes are persisted: symbol metadata (one per ticker), daily
//! bars keyed by (symbol, date) and intraday snapshots keyed by
//! (symbol, captured_at).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use marketfeed_market_data::{DailyQuote, SymbolProfile};

// =============================================================================
// Symbol Metadata
// =============================================================================

/// Identity fields of a symbol as reported by a provider.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolIdentity {
    pub symbol: String,
    pub exchange: Option<String>,
    pub security_type: Option<String>,
    pub cap_category: Option<String>,
}

impl SymbolIdentity {
    /// Identity with only the ticker known (first sighting outside metadata refresh).
    pub fn bare(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn from_profile(symbol: impl Into<String>, profile: &SymbolProfile) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: profile.exchange.clone(),
            security_type: profile.security_type.clone(),
            cap_category: profile.cap_category.map(|c| c.as_str().to_string()),
        }
    }
}

/// Statistics derived from the stored daily bars of a symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingStats {
    pub avg_daily_volume: Option<i64>,
    pub avg_daily_low: Option<Decimal>,
    pub avg_daily_high: Option<Decimal>,
    /// First close of the current calendar year
    pub year_start_price: Option<Decimal>,
    /// Open of the most recent bar that has one
    pub previous_day_open: Option<Decimal>,
    /// Close of the most recent bar that has one
    pub previous_day_close: Option<Decimal>,
}

/// One row per tracked ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMetadata {
    pub symbol: String,
    pub exchange: Option<String>,
    pub security_type: Option<String>,
    pub cap_category: Option<String>,
    #[serde(flatten)]
    pub stats: RollingStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Daily Bar
// =============================================================================

/// OHLCV row for one symbol on one trading date.
///
/// Rows may be partial: the opening capture creates an open-only row that the
/// closing capture completes later the same day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// Partial write to a daily bar. Supplied fields win; missing fields keep
/// whatever is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarPatch {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<i64>,
}

impl BarPatch {
    pub fn new(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
        }
    }

    pub fn open(mut self, open: Decimal) -> Self {
        self.open = Some(open);
        self
    }

    pub fn close(
        mut self,
        close: Decimal,
        high: Decimal,
        low: Decimal,
        volume: Option<i64>,
    ) -> Self {
        self.close = Some(close);
        self.high = Some(high);
        self.low = Some(low);
        self.volume = volume;
        self
    }

    pub fn from_daily_quote(symbol: impl Into<String>, quote: &DailyQuote) -> Self {
        Self {
            symbol: symbol.into(),
            date: quote.date,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            close: quote.close,
            volume: quote.volume,
        }
    }

    /// True when the patch carries no field at all.
    pub fn is_empty(&self) -> bool {
        self.open.is_none()
            && self.high.is_none()
            && self.low.is_none()
            && self.close.is_none()
            && self.volume.is_none()
    }
}

/// OHLCV values produced by merging a patch into a stored bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergedBar {
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<i64>,
}

impl MergedBar {
    /// Merge `patch` over `existing`.
    ///
    /// Supplied values overwrite, absent values never clear a stored field,
    /// and a known high/low is widened to cover the known open and close.
    pub fn merge(existing: Option<&DailyBar>, patch: &BarPatch) -> Self {
        let stored = existing.map(MergedBar::from).unwrap_or_default();
        let mut merged = Self {
            open: patch.open.or(stored.open),
            high: patch.high.or(stored.high),
            low: patch.low.or(stored.low),
            close: patch.close.or(stored.close),
            volume: patch.volume.or(stored.volume),
        };

        for price in [merged.open, merged.close].into_iter().flatten() {
            merged.high = merged.high.map(|h| h.max(price));
            merged.low = merged.low.map(|l| l.min(price));
        }

        merged
    }

    /// `low <= open, close <= high` for every known field.
    pub fn is_consistent(&self) -> bool {
        let within = |price: Option<Decimal>| {
            price.map_or(true, |p| {
                self.high.map_or(true, |h| p <= h) && self.low.map_or(true, |l| p >= l)
            })
        };
        within(self.open) && within(self.close)
    }
}

impl From<&DailyBar> for MergedBar {
    fn from(bar: &DailyBar) -> Self {
        Self {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

// =============================================================================
// Intraday Snapshot
// =============================================================================

/// Timestamped price sample taken during the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntradaySnapshot {
    pub symbol: String,
    pub captured_at: DateTime<Utc>,
    pub price: Decimal,
    /// Provider that supplied the price
    pub source: String,
}
