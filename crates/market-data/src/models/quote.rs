use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::profile::SymbolProfile;

/// What a provider is asked to fetch.
///
/// One kind per unit of collection work; providers decide which endpoint
/// answers each kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchKind {
    /// Identity plus roughly a year of daily history
    Metadata,
    /// Today's opening price
    Opening,
    /// Today's close, high, low and volume
    Closing,
    /// Current price
    Intraday,
}

impl FetchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::Metadata => "METADATA",
            FetchKind::Opening => "OPENING",
            FetchKind::Closing => "CLOSING",
            FetchKind::Intraday => "INTRADAY",
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One daily OHLCV row as reported by a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyQuote {
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
}

impl DailyQuote {
    /// Create a full OHLCV row
    pub fn ohlcv(
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
    ) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
        }
    }
}

/// Opening price of the current session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpeningQuote {
    /// Provider timestamp of the first trade/bar
    pub timestamp: DateTime<Utc>,
    /// Exchange trading date the figures belong to, when the source states
    /// it separately from `timestamp`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_date: Option<NaiveDate>,
    pub open: Decimal,
}

/// End-of-day figures of the current session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClosingQuote {
    pub timestamp: DateTime<Utc>,
    /// Exchange trading date the figures belong to, when the source states
    /// it separately from `timestamp`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_date: Option<NaiveDate>,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
}

/// Current price during the session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntradayQuote {
    pub timestamp: DateTime<Utc>,
    /// Exchange trading date the figures belong to, when the source states
    /// it separately from `timestamp`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_date: Option<NaiveDate>,
    pub price: Decimal,
}

/// Kind-specific payload of a successful fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotePayload {
    Metadata(SymbolProfile),
    Opening(OpeningQuote),
    Closing(ClosingQuote),
    Intraday(IntradayQuote),
}

impl QuotePayload {
    pub fn kind(&self) -> FetchKind {
        match self {
            QuotePayload::Metadata(_) => FetchKind::Metadata,
            QuotePayload::Opening(_) => FetchKind::Opening,
            QuotePayload::Closing(_) => FetchKind::Closing,
            QuotePayload::Intraday(_) => FetchKind::Intraday,
        }
    }
}

/// Result of a provider fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteData {
    /// Symbol as requested
    pub symbol: String,

    /// Provider that answered (YAHOO, ALPHA_VANTAGE, etc.)
    pub source: String,

    pub payload: QuotePayload,
}

impl QuoteData {
    pub fn new(symbol: impl Into<String>, source: impl Into<String>, payload: QuotePayload) -> Self {
        Self {
            symbol: symbol.into(),
            source: source.into(),
            payload,
        }
    }

    pub fn kind(&self) -> FetchKind {
        self.payload.kind()
    }
}
