//! Retry budget and backoff schedule for a single provider.

use std::time::Duration;

use crate::errors::{MarketDataError, RetryClass};

/// Per-provider retry policy.
///
/// `max_attempts` counts calls, so `3` means one call plus two retries.
/// The delay before retry `n` (0-based) is `base_delay * 2^n`, capped at
/// `max_delay`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// What the resolver does after a failed call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Call the same provider again after the delay.
    Retry { after: Duration },
    /// Give up on this provider and move to the next one.
    Advance,
    /// Stop resolving altogether.
    Stop,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// Backoff before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        2u32.checked_pow(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Decide the next step after `attempts` calls to the current provider,
    /// the last of which failed with `error`.
    pub fn decide(&self, attempts: u32, error: &MarketDataError) -> Decision {
        match error.retry_class() {
            RetryClass::WithBackoff if attempts < self.max_attempts => Decision::Retry {
                after: self.delay_for(attempts.saturating_sub(1)),
            },
            RetryClass::WithBackoff | RetryClass::NextProvider => Decision::Advance,
            RetryClass::Never => Decision::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(350))
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = policy();
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn test_transient_errors_retry_until_budget_spent() {
        let policy = policy();
        let error = MarketDataError::rate_limited("YAHOO");

        assert_eq!(
            policy.decide(1, &error),
            Decision::Retry {
                after: Duration::from_millis(100)
            }
        );
        assert_eq!(
            policy.decide(2, &error),
            Decision::Retry {
                after: Duration::from_millis(200)
            }
        );
        assert_eq!(policy.decide(3, &error), Decision::Advance);
    }

    #[test]
    fn test_conclusive_errors_advance_immediately() {
        let policy = policy();
        assert_eq!(
            policy.decide(1, &MarketDataError::not_found("YAHOO", "ZZZZ")),
            Decision::Advance
        );
        assert_eq!(
            policy.decide(1, &MarketDataError::malformed("YAHOO", "bad")),
            Decision::Advance
        );
    }

    #[test]
    fn test_resolver_errors_stop() {
        assert_eq!(
            policy().decide(1, &MarketDataError::NoProviders),
            Decision::Stop
        );
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1), Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(
            policy.decide(1, &MarketDataError::unavailable("YAHOO", "503")),
            Decision::Advance
        );
    }
}
