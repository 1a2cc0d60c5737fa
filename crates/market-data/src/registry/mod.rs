//! Provider orchestration.
//!
//! This module turns a list of providers into a reliable fetch:
//! - Retry budget and exponential backoff per provider
//! - Fallback across the provider chain in priority order
//! - Payload validation before a result is accepted

mod backoff;
mod fallback;
mod validator;

pub use backoff::{Decision, RetryPolicy};
pub use fallback::{AttemptState, FallbackResolver};
pub use validator::{QuoteValidator, ValidatorConfig};
