//! Alpha Vantage market data provider implementation.
//!
//! This module provides market data from the Alpha Vantage API:
//! - Daily history via the TIME_SERIES_DAILY endpoint
//! - Identity and market capitalisation via the OVERVIEW endpoint
//! - Opening, closing and current prices via the GLOBAL_QUOTE endpoint
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::{
    CapCategory, ClosingQuote, DailyQuote, FetchKind, IntradayQuote, OpeningQuote, QuoteData,
    QuotePayload, SymbolProfile,
};
use crate::provider::{MarketDataProvider, DEFAULT_PROVIDER_TIMEOUT};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// Alpha Vantage market data provider.
///
/// Used as the fallback source; the free tier quota makes it a poor primary.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    timeout: Duration,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// TIME_SERIES_DAILY response
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyRow>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyRow {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Unknown symbols come back as an empty object, hence all fields optional.
#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "02. open")]
    open: Option<String>,
    #[serde(rename = "03. high")]
    high: Option<String>,
    #[serde(rename = "04. low")]
    low: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
}

/// OVERVIEW response, reduced to the identity fields we store.
#[derive(Debug, Deserialize)]
struct CompanyOverviewResponse {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,
    #[serde(rename = "AssetType")]
    asset_type: Option<String>,
    #[serde(rename = "Exchange")]
    exchange: Option<String>,
    #[serde(rename = "MarketCapitalization")]
    market_capitalization: Option<String>,

    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

impl CompanyOverviewResponse {
    fn cap_category(&self) -> Option<CapCategory> {
        self.market_capitalization
            .as_deref()
            .and_then(AlphaVantageProvider::parse_decimal)
            .filter(|cap| *cap > Decimal::ZERO)
            .map(CapCategory::from_market_cap)
    }
}

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Alpha Vantage API key
    pub fn new(api_key: String) -> Self {
        Self::with_timeout(api_key, DEFAULT_PROVIDER_TIMEOUT)
    }

    /// Create a provider whose calls are bounded by `timeout`.
    pub fn with_timeout(api_key: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            timeout,
        }
    }

    /// Make an API request and return the response text.
    async fn request(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.push(("apikey", &self.api_key));

        let url = reqwest::Url::parse_with_params(BASE_URL, &all_params).map_err(|e| {
            MarketDataError::unavailable(PROVIDER_ID, format!("Failed to build URL: {}", e))
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::unavailable(PROVIDER_ID, "request timed out")
            } else {
                MarketDataError::unavailable(PROVIDER_ID, e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::rate_limited(PROVIDER_ID));
        }

        if !status.is_success() {
            return Err(MarketDataError::unavailable(
                PROVIDER_ID,
                format!("HTTP {}", status),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| MarketDataError::unavailable(PROVIDER_ID, e.to_string()))
    }

    fn parse<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, MarketDataError> {
        serde_json::from_str(text).map_err(|e| {
            MarketDataError::malformed(PROVIDER_ID, format!("Failed to parse response: {}", e))
        })
    }

    /// Check the in-band error fields Alpha Vantage uses instead of HTTP codes.
    fn check_api_error(
        symbol: &str,
        error_message: &Option<String>,
        note: &Option<String>,
        information: &Option<String>,
    ) -> Result<(), MarketDataError> {
        if let Some(ref msg) = error_message {
            if msg.contains("Invalid API call") || msg.contains("not found") {
                return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
            }
            return Err(MarketDataError::unavailable(PROVIDER_ID, msg.clone()));
        }

        // "Note" usually indicates rate limiting
        if let Some(ref msg) = note {
            if Self::is_quota_message(msg) {
                return Err(MarketDataError::rate_limited(PROVIDER_ID));
            }
            warn!("Alpha Vantage note: {}", msg);
        }

        if let Some(ref msg) = information {
            if Self::is_quota_message(msg) {
                return Err(MarketDataError::rate_limited(PROVIDER_ID));
            }
            warn!("Alpha Vantage info: {}", msg);
        }

        Ok(())
    }

    fn is_quota_message(msg: &str) -> bool {
        msg.contains("API call frequency") || msg.contains("rate limit") || msg.contains("premium")
    }

    /// Parse a date string in YYYY-MM-DD format.
    fn parse_date(date_str: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()
    }

    /// Parse a decimal value from a string.
    fn parse_decimal(s: &str) -> Option<Decimal> {
        Decimal::from_str(s.trim()).ok()
    }

    fn parse_volume(s: &str) -> Option<i64> {
        s.trim().parse::<i64>().ok()
    }

    fn daily_history(
        symbol: &str,
        response: TimeSeriesResponse,
    ) -> Result<Vec<DailyQuote>, MarketDataError> {
        Self::check_api_error(
            symbol,
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let time_series = response
            .time_series
            .ok_or_else(|| MarketDataError::not_found(PROVIDER_ID, symbol))?;

        let mut history: Vec<DailyQuote> = time_series
            .into_iter()
            .filter_map(|(date_str, row)| {
                Some(DailyQuote {
                    date: Self::parse_date(&date_str)?,
                    open: Self::parse_decimal(&row.open),
                    high: Self::parse_decimal(&row.high),
                    low: Self::parse_decimal(&row.low),
                    close: Self::parse_decimal(&row.close),
                    volume: Self::parse_volume(&row.volume),
                })
            })
            .collect();

        if history.is_empty() {
            return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
        }

        history.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(history)
    }

    /// Map a GLOBAL_QUOTE payload onto the requested kind.
    fn global_quote_payload(
        symbol: &str,
        kind: FetchKind,
        response: GlobalQuoteResponse,
        fetched_at: DateTime<Utc>,
    ) -> Result<QuotePayload, MarketDataError> {
        Self::check_api_error(
            symbol,
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let quote = response.global_quote.unwrap_or_default();
        if quote.symbol.is_none() {
            return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
        }

        let field = |value: &Option<String>, name: &str| -> Result<Decimal, MarketDataError> {
            value
                .as_deref()
                .and_then(Self::parse_decimal)
                .ok_or_else(|| MarketDataError::malformed(PROVIDER_ID, format!("missing {}", name)))
        };

        // Outside the session (and on the free tier) this is an earlier day.
        let session_date = quote
            .latest_trading_day
            .as_deref()
            .and_then(Self::parse_date);

        match kind {
            FetchKind::Opening => Ok(QuotePayload::Opening(OpeningQuote {
                session_date,
                timestamp: fetched_at,
                open: field(&quote.open, "open")?,
            })),
            FetchKind::Closing => Ok(QuotePayload::Closing(ClosingQuote {
                session_date,
                timestamp: fetched_at,
                close: field(&quote.price, "price")?,
                high: field(&quote.high, "high")?,
                low: field(&quote.low, "low")?,
                volume: quote.volume.as_deref().and_then(Self::parse_volume),
            })),
            FetchKind::Intraday => Ok(QuotePayload::Intraday(IntradayQuote {
                session_date,
                timestamp: fetched_at,
                price: field(&quote.price, "price")?,
            })),
            FetchKind::Metadata => Err(MarketDataError::malformed(
                PROVIDER_ID,
                "GLOBAL_QUOTE does not carry metadata",
            )),
        }
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<SymbolProfile, MarketDataError> {
        let params = [
            ("function", "TIME_SERIES_DAILY"),
            ("symbol", symbol),
            ("outputsize", "compact"), // 'full' is premium-only
        ];
        let text = self.request(&params).await?;
        let history = Self::daily_history(symbol, Self::parse(&text)?)?;

        // Identity is best effort: the history alone is enough to refresh statistics.
        let overview = match self.fetch_overview(symbol).await {
            Ok(overview) => Some(overview),
            Err(e @ MarketDataError::RateLimited { .. }) => return Err(e),
            Err(e) => {
                warn!("Alpha Vantage: no overview for {}: {}", symbol, e);
                None
            }
        };

        Ok(SymbolProfile {
            exchange: overview.as_ref().and_then(|o| o.exchange.clone()),
            security_type: overview.as_ref().and_then(|o| o.asset_type.clone()),
            cap_category: overview.as_ref().and_then(|o| o.cap_category()),
            history,
        })
    }

    async fn fetch_overview(
        &self,
        symbol: &str,
    ) -> Result<CompanyOverviewResponse, MarketDataError> {
        let params = [("function", "OVERVIEW"), ("symbol", symbol)];
        let text = self.request(&params).await?;
        let response: CompanyOverviewResponse = Self::parse(&text)?;

        Self::check_api_error(
            symbol,
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        if response.symbol.is_none() {
            return Err(MarketDataError::not_found(PROVIDER_ID, symbol));
        }

        Ok(response)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, symbol: &str, kind: FetchKind) -> Result<QuoteData, MarketDataError> {
        let payload = match kind {
            FetchKind::Metadata => QuotePayload::Metadata(self.fetch_profile(symbol).await?),
            _ => {
                let params = [("function", "GLOBAL_QUOTE"), ("symbol", symbol)];
                let text = self.request(&params).await?;
                Self::global_quote_payload(symbol, kind, Self::parse(&text)?, Utc::now())?
            }
        };

        debug!("Alpha Vantage: fetched {} for {}", kind, symbol);
        Ok(QuoteData::new(symbol, PROVIDER_ID, payload))
    }
}
