//! Yahoo Finance market data provider.
//!
//! Serves every fetch kind from the chart endpoint:
//! - metadata: one year of daily bars plus exchange and instrument type
//! - opening / closing / intraday: today's one-minute bars

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;
use crate::models::{
    ClosingQuote, DailyQuote, FetchKind, IntradayQuote, OpeningQuote, QuoteData, QuotePayload,
    SymbolProfile,
};
use crate::provider::{MarketDataProvider, DEFAULT_PROVIDER_TIMEOUT};

const PROVIDER_ID: &str = "YAHOO";

/// One chart bar with the library's float fields already checked.
#[derive(Clone, Debug, PartialEq)]
struct Bar {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: Option<i64>,
}

impl Bar {
    /// Convert a library quote, dropping the empty rows Yahoo pads sessions with.
    fn from_yahoo(quote: &yahoo::Quote) -> Option<Self> {
        let timestamp = Utc.timestamp_opt(quote.timestamp as i64, 0).single()?;
        if !(quote.close.is_finite() && quote.close > 0.0) {
            return None;
        }

        Some(Self {
            timestamp,
            open: quote.open,
            high: quote.high,
            low: quote.low,
            close: quote.close,
            volume: i64::try_from(quote.volume).ok(),
        })
    }
}

fn to_decimal(value: f64) -> Option<Decimal> {
    if value.is_finite() && value > 0.0 {
        Decimal::from_f64(value).map(|d| d.round_dp(4))
    } else {
        None
    }
}

fn required(value: f64, field: &str) -> Result<Decimal, MarketDataError> {
    to_decimal(value).ok_or_else(|| {
        MarketDataError::malformed(PROVIDER_ID, format!("invalid {}: {}", field, value))
    })
}

/// Yahoo Finance market data provider.
///
/// Primary source: no API key and a generous quota.
pub struct YahooProvider {
    connector: yahoo::YahooConnector,
    timeout: Duration,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new() -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::unavailable(
                PROVIDER_ID,
                format!("Failed to initialize Yahoo connector: {}", e),
            )
        })?;
        Ok(Self {
            connector,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
        })
    }

    /// Bound every call to `timeout` instead of the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn map_error(symbol: &str, error: yahoo::YahooError) -> MarketDataError {
        if matches!(error, yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) {
            return MarketDataError::not_found(PROVIDER_ID, symbol);
        }

        let message = error.to_string();
        if message.contains("429") || message.contains("Too Many Requests") {
            MarketDataError::rate_limited(PROVIDER_ID)
        } else if message.contains("deserializ") || message.contains("parse") {
            MarketDataError::malformed(PROVIDER_ID, message)
        } else {
            MarketDataError::unavailable(PROVIDER_ID, message)
        }
    }

    /// Fetch chart bars for `interval` over `range` (e.g. "1m" over "1d").
    async fn bars(
        &self,
        symbol: &str,
        interval: &str,
        range: &str,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let response = self
            .connector
            .get_quote_range(symbol, interval, range)
            .await
            .map_err(|e| Self::map_error(symbol, e))?;

        let quotes = response.quotes().map_err(|e| Self::map_error(symbol, e))?;
        let bars: Vec<Bar> = quotes.iter().filter_map(Bar::from_yahoo).collect();

        if bars.is_empty() {
            warn!("No usable {} bars returned for '{}'", interval, symbol);
            return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
        }

        Ok(bars)
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<SymbolProfile, MarketDataError> {
        let response = self
            .connector
            .get_quote_range(symbol, "1d", "1y")
            .await
            .map_err(|e| Self::map_error(symbol, e))?;

        let quotes = response.quotes().map_err(|e| Self::map_error(symbol, e))?;
        let bars: Vec<Bar> = quotes.iter().filter_map(Bar::from_yahoo).collect();
        if bars.is_empty() {
            return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
        }

        let mut profile = SymbolProfile {
            history: daily_history(&bars),
            ..SymbolProfile::default()
        };

        match response.metadata() {
            Ok(meta) => {
                profile.exchange = non_empty(meta.exchange_name.clone());
                profile.security_type = non_empty(meta.instrument_type.clone());
            }
            Err(e) => warn!("No chart metadata for '{}': {}", symbol, e),
        }

        Ok(profile)
    }

    async fn fetch_closing(&self, symbol: &str) -> Result<ClosingQuote, MarketDataError> {
        match self.bars(symbol, "1m", "1d").await {
            Ok(bars) => closing_from_bars(&bars),
            Err(MarketDataError::NotFound { .. }) => {
                debug!("No minute bars for '{}', using the daily bar", symbol);
                let bars = self.bars(symbol, "1d", "5d").await?;
                let last = bars.last().cloned().into_iter().collect::<Vec<_>>();
                closing_from_bars(&last)
            }
            Err(e) => Err(e),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn daily_history(bars: &[Bar]) -> Vec<DailyQuote> {
    let mut history: Vec<DailyQuote> = bars
        .iter()
        .map(|bar| DailyQuote {
            date: bar.timestamp.date_naive(),
            open: to_decimal(bar.open),
            high: to_decimal(bar.high),
            low: to_decimal(bar.low),
            close: to_decimal(bar.close),
            volume: bar.volume,
        })
        .collect();

    history.sort_by(|a, b| a.date.cmp(&b.date));
    history.dedup_by(|later, earlier| later.date == earlier.date);
    history
}

fn opening_from_bars(bars: &[Bar]) -> Result<OpeningQuote, MarketDataError> {
    let first = bars
        .iter()
        .find(|bar| bar.open.is_finite() && bar.open > 0.0)
        .ok_or_else(|| MarketDataError::malformed(PROVIDER_ID, "no bar with an open price"))?;

    Ok(OpeningQuote {
        session_date: None,
        timestamp: first.timestamp,
        open: required(first.open, "open")?,
    })
}

fn closing_from_bars(bars: &[Bar]) -> Result<ClosingQuote, MarketDataError> {
    let last = bars
        .last()
        .ok_or_else(|| MarketDataError::malformed(PROVIDER_ID, "no bars"))?;

    let high = bars
        .iter()
        .map(|bar| bar.high)
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold(f64::MIN, f64::max);
    let low = bars
        .iter()
        .map(|bar| bar.low)
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold(f64::MAX, f64::min);
    let volume = bars
        .iter()
        .filter_map(|bar| bar.volume)
        .fold(None, |acc: Option<i64>, v| Some(acc.unwrap_or(0).saturating_add(v)));

    Ok(ClosingQuote {
        session_date: None,
        timestamp: last.timestamp,
        close: required(last.close, "close")?,
        high: required(high, "high")?,
        low: required(low, "low")?,
        volume,
    })
}

fn intraday_from_bars(bars: &[Bar]) -> Result<IntradayQuote, MarketDataError> {
    let last = bars
        .last()
        .ok_or_else(|| MarketDataError::malformed(PROVIDER_ID, "no bars"))?;

    Ok(IntradayQuote {
        session_date: None,
        timestamp: last.timestamp,
        price: required(last.close, "close")?,
    })
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, symbol: &str, kind: FetchKind) -> Result<QuoteData, MarketDataError> {
        debug!("Fetching {} for {} from Yahoo", kind, symbol);

        let payload = match kind {
            FetchKind::Metadata => QuotePayload::Metadata(self.fetch_profile(symbol).await?),
            FetchKind::Opening => {
                let bars = self.bars(symbol, "1m", "1d").await?;
                QuotePayload::Opening(opening_from_bars(&bars)?)
            }
            FetchKind::Closing => QuotePayload::Closing(self.fetch_closing(symbol).await?),
            FetchKind::Intraday => {
                let bars = self.bars(symbol, "1m", "1d").await?;
                QuotePayload::Intraday(intraday_from_bars(&bars)?)
            }
        };

        Ok(QuoteData::new(symbol, PROVIDER_ID, payload))
    }
}
