//! Marketfeed Market Data Crate
//!
//! Provider-agnostic quote fetching for the collector.
//!
//! # Overview
//!
//! - One contract ([`MarketDataProvider::fetch`]) for every quote source
//! - Yahoo Finance (primary) and Alpha Vantage (fallback) implementations
//! - Typed provider errors classified into retry classes
//! - A [`FallbackResolver`] that retries with capped exponential backoff and
//!   walks the provider chain in priority order
//!
//! # Architecture
//!
//! ```text
//!                          +------------------+
//!                          | FallbackResolver |  (retry + fallback state machine)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    Provider      |  (Yahoo, AlphaVantage, etc.)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  QuoteValidator  |  (bad payload -> Malformed)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |    QuoteData     |  (kind-specific payload)
//!                          +------------------+
//! ```

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::{MarketDataError, ProviderFailure, RetryClass};

pub use models::{
    CapCategory, ClosingQuote, DailyQuote, FetchKind, IntradayQuote, OpeningQuote, QuoteData,
    QuotePayload, SymbolProfile,
};

pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{MarketDataProvider, DEFAULT_PROVIDER_TIMEOUT};

pub use registry::{
    AttemptState, Decision, FallbackResolver, QuoteValidator, RetryPolicy, ValidatorConfig,
};
