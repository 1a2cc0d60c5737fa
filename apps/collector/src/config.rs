use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use marketfeed_core::calendar::us_exchange_holidays;
use marketfeed_core::{CalendarConfig, RunnerConfig, ScheduleConfig};
use marketfeed_market_data::RetryPolicy;

/// Tracked when `MF_SYMBOLS` is not set.
pub const DEFAULT_SYMBOLS: [&str; 30] = [
    "AAPL", "GOOGL", "MSFT", "AMZN", "TSLA", "META", "NVDA", "JPM", "JNJ", "V", "PG", "UNH", "HD",
    "MA", "DIS", "NFLX", "ADBE", "CRM", "BAC", "XOM", "KO", "PFE", "INTC", "CSCO", "VZ", "T",
    "IBM", "WMT", "CVX", "MRK",
];

/// Quote sources the collector knows how to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Yahoo,
    AlphaVantage,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YAHOO" => Ok(ProviderKind::Yahoo),
            "ALPHA_VANTAGE" | "ALPHAVANTAGE" => Ok(ProviderKind::AlphaVantage),
            other => bail!("unknown provider '{}'", other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

pub struct Config {
    pub db_path: String,
    /// Provider chain in priority order; unusable entries already removed
    pub providers: Vec<ProviderKind>,
    pub alpha_vantage_key: Option<String>,
    pub retry: RetryPolicy,
    pub provider_timeout: Duration,
    pub calendar: CalendarConfig,
    pub runner: RunnerConfig,
    pub schedule: ScheduleConfig,
    pub log_format: LogFormat,
}

/// Keys shipped in sample `.env` files rather than real credentials.
fn is_placeholder_key(key: &str) -> bool {
    let key = key.trim();
    key.is_empty()
        || key.eq_ignore_ascii_case("demo")
        || key.to_ascii_lowercase().starts_with("your")
        || key.contains('<')
}

impl Config {
    /// Load from the process environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Invalid values are errors; missing
    /// ones take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = var("DATABASE_URL").unwrap_or_else(|| "marketfeed.db".to_string());

        let symbols = match var("MF_SYMBOLS") {
            Some(raw) => parse_symbols(&raw)?,
            None => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };

        let alpha_vantage_key = var("ALPHA_VANTAGE_API_KEY").filter(|k| !is_placeholder_key(k));
        let mut providers = Vec::new();
        for entry in var("MF_PROVIDERS")
            .unwrap_or_else(|| "YAHOO,ALPHA_VANTAGE".to_string())
            .split(',')
            .filter(|s| !s.trim().is_empty())
        {
            let kind: ProviderKind = entry.parse().context("MF_PROVIDERS")?;
            if kind == ProviderKind::AlphaVantage && alpha_vantage_key.is_none() {
                continue;
            }
            if !providers.contains(&kind) {
                providers.push(kind);
            }
        }
        if providers.is_empty() {
            bail!("MF_PROVIDERS: no usable provider configured");
        }

        let retry = RetryPolicy::new(
            parse_or(&var, "MF_MAX_RETRIES", 3u32)?,
            Duration::from_millis(parse_or(&var, "MF_BACKOFF_BASE_MS", 500u64)?),
            Duration::from_millis(parse_or(&var, "MF_BACKOFF_MAX_MS", 8_000u64)?),
        );
        if retry.base_delay > retry.max_delay {
            bail!("MF_BACKOFF_BASE_MS must not exceed MF_BACKOFF_MAX_MS");
        }

        let defaults = CalendarConfig::default();
        let holidays = match var("MF_HOLIDAYS") {
            Some(raw) => parse_holidays(&raw)?,
            None => us_exchange_holidays(),
        };
        let calendar = CalendarConfig {
            timezone: var("MF_TIMEZONE").unwrap_or(defaults.timezone),
            session_open: time_or(&var, "MF_SESSION_OPEN", defaults.session_open)?,
            session_close: time_or(&var, "MF_SESSION_CLOSE", defaults.session_close)?,
            holidays,
            opening_delay_mins: parse_or(&var, "MF_OPENING_DELAY_MINS", defaults.opening_delay_mins)?,
            closing_delay_mins: parse_or(&var, "MF_CLOSING_DELAY_MINS", defaults.closing_delay_mins)?,
            ..defaults
        };
        // Fail now rather than on the first run.
        marketfeed_core::MarketCalendar::from_config(&calendar)
            .map_err(|e| anyhow!("invalid market calendar: {}", e))?;

        let runner = RunnerConfig {
            symbols,
            pool_size: parse_or(&var, "MF_POOL_SIZE", 4usize)?.max(1),
            run_timeout: Duration::from_secs(parse_or(&var, "MF_RUN_TIMEOUT_SECS", 900u64)?),
        };

        let schedule_defaults = ScheduleConfig::default();
        let schedule = ScheduleConfig {
            metadata_at: time_or(&var, "MF_METADATA_AT", schedule_defaults.metadata_at)?,
            intraday_interval_mins: parse_or(
                &var,
                "MF_INTRADAY_INTERVAL_MINS",
                schedule_defaults.intraday_interval_mins,
            )?,
        };
        if schedule.intraday_interval_mins == 0 {
            bail!("MF_INTRADAY_INTERVAL_MINS must be positive");
        }

        let log_format = match var("MF_LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Text,
            Some(f) if f == "text" => LogFormat::Text,
            Some(f) if f == "json" => LogFormat::Json,
            Some(other) => bail!("MF_LOG_FORMAT: expected text or json, got '{}'", other),
        };

        Ok(Self {
            db_path,
            providers,
            alpha_vantage_key,
            retry,
            provider_timeout: Duration::from_secs(parse_or(&var, "MF_PROVIDER_TIMEOUT_SECS", 30u64)?),
            calendar,
            runner,
            schedule,
            log_format,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{}: invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn time_or(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: NaiveTime,
) -> Result<NaiveTime> {
    match var(key) {
        Some(raw) => NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|e| anyhow!("{}: expected HH:MM, got '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_symbols(raw: &str) -> Result<Vec<String>> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_ascii_uppercase()) {
        if symbol.is_empty() || symbols.contains(&symbol) {
            continue;
        }
        symbols.push(symbol);
    }
    if symbols.is_empty() {
        bail!("MF_SYMBOLS: no symbols listed");
    }
    Ok(symbols)
}

fn parse_holidays(raw: &str) -> Result<Vec<NaiveDate>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| anyhow!("MF_HOLIDAYS: invalid date '{}': {}", s, e))
        })
        .collect()
}
