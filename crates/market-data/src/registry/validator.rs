//! Quote data validation.
//!
//! Validates provider payloads before the resolver accepts them:
//! - Prices must be strictly positive
//! - OHLC invariants (high >= low, close between high/low)
//! - Non-negative volume
//! - Reasonable value ranges
//!
//! Hard failures become `Malformed`, which sends the resolver to the next
//! provider. Bad rows inside a metadata history are dropped with a warning.

use log::warn;
use rust_decimal::Decimal;

use crate::errors::MarketDataError;
use crate::models::{DailyQuote, QuoteData, QuotePayload};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ValidationSeverity {
    /// Hard failure - reject payload, try next provider.
    Hard,
    /// Soft warning - accept payload but log warning.
    Soft,
}

/// Validation result details.
#[derive(Clone, Debug)]
pub(crate) struct ValidationIssue {
    /// Severity of the issue.
    pub severity: ValidationSeverity,
    /// Description of the issue.
    pub message: String,
}

impl ValidationIssue {
    fn hard(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message: message.into(),
        }
    }

    fn soft(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message: message.into(),
        }
    }
}

/// Quote validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Whether to reject payloads where high < low or close is outside the range.
    pub reject_invalid_ohlc: bool,
    /// Maximum allowed price value (for sanity check).
    pub max_price: Option<Decimal>,
    /// Whether to warn on zero volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            reject_invalid_ohlc: true,
            max_price: Some(Decimal::from(1_000_000_000i64)), // 1 billion as sanity check
            warn_on_zero_volume: true,
        }
    }
}

/// Provider payload validator.
#[derive(Clone, Debug, Default)]
pub struct QuoteValidator {
    config: ValidatorConfig,
}

impl QuoteValidator {
    /// Create a new validator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a payload, returning it (possibly with history rows removed).
    ///
    /// Warnings are logged but do not cause rejection.
    pub fn validate(&self, mut data: QuoteData) -> Result<QuoteData, MarketDataError> {
        let mut issues: Vec<ValidationIssue> = Vec::new();

        match &mut data.payload {
            QuotePayload::Metadata(profile) => {
                let before = profile.history.len();
                profile.history.retain(|bar| {
                    self.daily_issues(bar)
                        .iter()
                        .all(|i| i.severity == ValidationSeverity::Soft)
                });

                let dropped = before - profile.history.len();
                if dropped > 0 {
                    issues.push(ValidationIssue::soft(format!(
                        "Dropped {} invalid daily bar(s)",
                        dropped
                    )));
                }
                if profile.history.is_empty() {
                    issues.push(ValidationIssue::hard("No valid daily bars in history"));
                }
            }
            QuotePayload::Opening(quote) => {
                self.validate_price("open", quote.open, &mut issues);
            }
            QuotePayload::Closing(quote) => {
                self.validate_price("close", quote.close, &mut issues);
                self.validate_price("high", quote.high, &mut issues);
                self.validate_price("low", quote.low, &mut issues);
                self.validate_range(quote.close, quote.high, quote.low, &mut issues);
                self.validate_volume(quote.volume, &mut issues);
            }
            QuotePayload::Intraday(quote) => {
                self.validate_price("price", quote.price, &mut issues);
            }
        }

        let errors: Vec<&str> = issues
            .iter()
            .filter(|i| i.severity == ValidationSeverity::Hard)
            .map(|i| i.message.as_str())
            .collect();

        if !errors.is_empty() {
            return Err(MarketDataError::malformed(&data.source, errors.join("; ")));
        }

        for issue in issues.iter() {
            warn!(
                "Quote validation warning for {} ({}): {}",
                data.symbol, data.source, issue.message
            );
        }

        Ok(data)
    }

    fn daily_issues(&self, bar: &DailyQuote) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (name, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ] {
            if let Some(value) = value {
                self.validate_price(name, value, &mut issues);
            }
        }

        if let (Some(close), Some(high), Some(low)) = (bar.close, bar.high, bar.low) {
            self.validate_range(close, high, low, &mut issues);
        }
        if bar.close.is_none() {
            issues.push(ValidationIssue::hard(format!("Missing close on {}", bar.date)));
        }
        if let Some(volume) = bar.volume {
            if volume < 0 {
                issues.push(ValidationIssue::hard(format!("Negative volume: {}", volume)));
            }
        }

        issues
    }

    /// Prices must be strictly positive and below the sanity ceiling.
    fn validate_price(&self, name: &str, value: Decimal, issues: &mut Vec<ValidationIssue>) {
        if value <= Decimal::ZERO {
            issues.push(ValidationIssue::hard(format!(
                "Non-positive {} price: {}",
                name, value
            )));
        }

        if let Some(max_price) = self.config.max_price {
            if value > max_price {
                issues.push(ValidationIssue::hard(format!(
                    "{} price ({}) exceeds max threshold ({})",
                    name, value, max_price
                )));
            }
        }
    }

    /// Validate OHLC invariants.
    ///
    /// - High must be >= Low
    /// - Close must be between Low and High
    fn validate_range(
        &self,
        close: Decimal,
        high: Decimal,
        low: Decimal,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if !self.config.reject_invalid_ohlc {
            return;
        }

        if high < low {
            issues.push(ValidationIssue::hard(format!(
                "High ({}) is less than Low ({})",
                high, low
            )));
        } else if close < low || close > high {
            issues.push(ValidationIssue::hard(format!(
                "Close ({}) is outside High/Low range ({}-{})",
                close, low, high
            )));
        }
    }

    fn validate_volume(&self, volume: Option<i64>, issues: &mut Vec<ValidationIssue>) {
        match volume {
            Some(v) if v < 0 => {
                issues.push(ValidationIssue::hard(format!("Negative volume: {}", v)));
            }
            Some(0) if self.config.warn_on_zero_volume => {
                issues.push(ValidationIssue::soft("Zero volume"));
            }
            _ => {}
        }
    }
}
