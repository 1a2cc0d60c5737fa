//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The typed error every provider returns
//! - [`ProviderFailure`]: One provider's last error, as reported by the resolver
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Providers never leak raw transport errors: every failure is mapped onto one
/// of the typed variants so the resolver can decide on retries without knowing
/// provider internals. Each variant is classified into a [`RetryClass`] via
/// [`retry_class`](Self::retry_class).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// The provider rate limited the request (HTTP 429 or an API quota note).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The symbol is unknown to the provider, or it has no data for it.
    #[error("Symbol not found: {symbol} ({provider})")]
    NotFound {
        /// The provider that answered
        provider: String,
        /// The symbol that was requested
        symbol: String,
    },

    /// The provider could not be reached, timed out or failed server-side.
    #[error("Provider unavailable: {provider} - {message}")]
    Unavailable {
        /// The provider that failed
        provider: String,
        /// Transport or server error description
        message: String,
    },

    /// The provider answered with a payload that could not be used.
    #[error("Malformed response: {provider} - {message}")]
    Malformed {
        /// The provider that answered
        provider: String,
        /// What was wrong with the payload
        message: String,
    },

    /// The resolver was handed an empty provider chain.
    #[error("No providers configured")]
    NoProviders,

    /// Every provider in the chain was tried and none succeeded.
    #[error("All providers exhausted for {symbol}: {}", format_failures(.failures))]
    AllProvidersExhausted {
        /// The symbol that was being fetched
        symbol: String,
        /// The last error of each provider, in chain order
        failures: Vec<ProviderFailure>,
    },

    /// The caller's deadline passed before the chain was worked through.
    #[error("Deadline exceeded for {symbol}: {}", format_failures(.failures))]
    DeadlineExceeded {
        symbol: String,
        /// Providers tried before the deadline, in chain order
        failures: Vec<ProviderFailure>,
    },
}

/// Last error observed for one provider during a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFailure {
    pub provider: String,
    /// Number of calls made to this provider
    pub attempts: u32,
    pub error: String,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} attempt(s): {}",
            self.provider, self.attempts, self.error
        )
    }
}

fn format_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use marketfeed_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "YAHOO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::NotFound {
    ///     provider: "YAHOO".to_string(),
    ///     symbol: "INVALID".to_string(),
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. } | Self::Unavailable { .. } => RetryClass::WithBackoff,

            // Conclusive for this provider only
            Self::NotFound { .. } | Self::Malformed { .. } => RetryClass::NextProvider,

            Self::NoProviders
            | Self::AllProvidersExhausted { .. }
            | Self::DeadlineExceeded { .. } => RetryClass::Never,
        }
    }

    /// The provider the error originated from, if it came from a single provider.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::RateLimited { provider }
            | Self::NotFound { provider, .. }
            | Self::Unavailable { provider, .. }
            | Self::Malformed { provider, .. } => Some(provider),
            Self::NoProviders
            | Self::AllProvidersExhausted { .. }
            | Self::DeadlineExceeded { .. } => None,
        }
    }

    pub fn unavailable(provider: &str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(provider: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(provider: &str, symbol: &str) -> Self {
        Self::NotFound {
            provider: provider.to_string(),
            symbol: symbol.to_string(),
        }
    }

    pub fn rate_limited(provider: &str) -> Self {
        Self::RateLimited {
            provider: provider.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_retries_with_backoff() {
        let error = MarketDataError::rate_limited("YAHOO");
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_unavailable_retries_with_backoff() {
        let error = MarketDataError::unavailable("ALPHA_VANTAGE", "HTTP 503");
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_not_found_moves_to_next_provider() {
        let error = MarketDataError::not_found("YAHOO", "ZZZZ");
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_malformed_moves_to_next_provider() {
        let error = MarketDataError::malformed("YAHOO", "missing close");
        assert_eq!(error.retry_class(), RetryClass::NextProvider);
    }

    #[test]
    fn test_resolver_errors_never_retry() {
        assert_eq!(MarketDataError::NoProviders.retry_class(), RetryClass::Never);
        let error = MarketDataError::AllProvidersExhausted {
            symbol: "AAPL".to_string(),
            failures: vec![],
        };
        assert_eq!(error.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_provider_accessor() {
        assert_eq!(
            MarketDataError::rate_limited("YAHOO").provider(),
            Some("YAHOO")
        );
        assert_eq!(MarketDataError::NoProviders.provider(), None);
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::not_found("YAHOO", "INVALID");
        assert_eq!(format!("{}", error), "Symbol not found: INVALID (YAHOO)");

        let error = MarketDataError::rate_limited("YAHOO");
        assert_eq!(format!("{}", error), "Rate limited: YAHOO");

        let error = MarketDataError::AllProvidersExhausted {
            symbol: "AAPL".to_string(),
            failures: vec![
                ProviderFailure {
                    provider: "YAHOO".to_string(),
                    attempts: 3,
                    error: "Rate limited: YAHOO".to_string(),
                },
                ProviderFailure {
                    provider: "ALPHA_VANTAGE".to_string(),
                    attempts: 1,
                    error: "Symbol not found: AAPL (ALPHA_VANTAGE)".to_string(),
                },
            ],
        };
        assert_eq!(
            format!("{}", error),
            "All providers exhausted for AAPL: YAHOO after 3 attempt(s): Rate limited: YAHOO; \
             ALPHA_VANTAGE after 1 attempt(s): Symbol not found: AAPL (ALPHA_VANTAGE)"
        );
    }
}
