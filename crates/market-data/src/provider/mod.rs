//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - Concrete provider implementations (Yahoo, Alpha Vantage)
//!
//! Providers map every failure onto a typed `MarketDataError`; retries and
//! fallback live in the registry module, never in the providers themselves.

mod traits;

pub mod alpha_vantage;
pub mod yahoo;

pub use traits::{MarketDataProvider, DEFAULT_PROVIDER_TIMEOUT};
