//! Market data provider trait definitions.
//!
//! This module defines the `MarketDataProvider` trait that every quote
//! source implements.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{FetchKind, QuoteData};

/// Default bound for a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// The fallback resolver only sees this contract; wire formats stay inside
/// the implementation.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use marketfeed_market_data::{FetchKind, MarketDataError, MarketDataProvider, QuoteData};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     async fn fetch(&self, symbol: &str, kind: FetchKind) -> Result<QuoteData, MarketDataError> {
///         // ... call the API and map its payload
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO", "ALPHA_VANTAGE", etc.
    /// Used for logging, failure reports and chain configuration.
    fn id(&self) -> &'static str;

    /// Upper bound for one `fetch` call.
    ///
    /// The resolver enforces it and reports an overrun as `Unavailable`.
    fn timeout(&self) -> Duration {
        DEFAULT_PROVIDER_TIMEOUT
    }

    /// Fetch one kind of data for a symbol.
    ///
    /// # Errors
    ///
    /// Returns one of the typed provider errors:
    /// - `RateLimited` when the source throttles the caller
    /// - `NotFound` when the source has no data for the symbol
    /// - `Unavailable` for transport, timeout and server failures
    /// - `Malformed` when the payload cannot be mapped
    async fn fetch(&self, symbol: &str, kind: FetchKind) -> Result<QuoteData, MarketDataError>;
}
