//! Fallback resolver.
//!
//! Walks a fixed provider chain, retrying transient failures with backoff and
//! moving on after conclusive ones. The loop is driven by [`AttemptState`] and
//! [`RetryPolicy::decide`] so the decision table can be tested on its own.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

use super::backoff::{Decision, RetryPolicy};
use super::QuoteValidator;
use crate::errors::{MarketDataError, ProviderFailure};
use crate::models::{FetchKind, QuoteData};
use crate::provider::MarketDataProvider;

/// Position of a resolution in the provider chain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttemptState {
    /// Index into the provider chain
    pub provider_index: usize,
    /// Calls made to the current provider
    pub attempt: u32,
    /// Last error returned by the current provider
    pub last_error: Option<MarketDataError>,
}

impl AttemptState {
    /// Record a failed call and decide what to do next.
    pub fn on_failure(&mut self, error: MarketDataError, policy: &RetryPolicy) -> Decision {
        self.attempt += 1;
        let decision = policy.decide(self.attempt, &error);
        self.last_error = Some(error);
        decision
    }

    /// Close out the current provider and point at the next one.
    pub fn advance(&mut self, provider: &str) -> ProviderFailure {
        let failure = ProviderFailure {
            provider: provider.to_string(),
            attempts: self.attempt,
            error: self
                .last_error
                .take()
                .map(|e| e.to_string())
                .unwrap_or_default(),
        };
        self.provider_index += 1;
        self.attempt = 0;
        failure
    }
}

/// Resolves a fetch against an ordered provider chain.
pub struct FallbackResolver {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    policy: RetryPolicy,
    validator: QuoteValidator,
}

impl FallbackResolver {
    /// Create a resolver with the default validator.
    ///
    /// Provider order is the priority order and is never reshuffled.
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>, policy: RetryPolicy) -> Self {
        Self::with_validator(providers, policy, QuoteValidator::new())
    }

    pub fn with_validator(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        policy: RetryPolicy,
        validator: QuoteValidator,
    ) -> Self {
        Self {
            providers,
            policy,
            validator,
        }
    }

    /// Provider identifiers in chain order.
    pub fn provider_ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch `kind` for `symbol`, returning the first validated success.
    ///
    /// # Errors
    ///
    /// - `NoProviders` if the chain is empty
    /// - `AllProvidersExhausted` carrying each provider's last error otherwise
    pub async fn resolve(
        &self,
        symbol: &str,
        kind: FetchKind,
    ) -> Result<QuoteData, MarketDataError> {
        self.resolve_inner(symbol, kind, None).await
    }

    /// Like [`resolve`](Self::resolve), but no call, retry or fallback starts
    /// once `deadline` has passed. A call already in flight still runs up to
    /// its provider timeout.
    ///
    /// # Errors
    ///
    /// `DeadlineExceeded` with the providers tried so far when time runs out,
    /// otherwise the same errors as `resolve`.
    pub async fn resolve_until(
        &self,
        symbol: &str,
        kind: FetchKind,
        deadline: Instant,
    ) -> Result<QuoteData, MarketDataError> {
        self.resolve_inner(symbol, kind, Some(deadline)).await
    }

    async fn resolve_inner(
        &self,
        symbol: &str,
        kind: FetchKind,
        deadline: Option<Instant>,
    ) -> Result<QuoteData, MarketDataError> {
        if self.providers.is_empty() {
            return Err(MarketDataError::NoProviders);
        }

        let mut state = AttemptState::default();
        let mut failures: Vec<ProviderFailure> = Vec::new();
        let expired = |after: Duration| deadline.is_some_and(|d| Instant::now() + after >= d);

        while let Some(provider) = self.providers.get(state.provider_index) {
            let provider_id = provider.id();

            if expired(Duration::ZERO) {
                if state.attempt > 0 {
                    failures.push(state.advance(provider_id));
                }
                return Err(Self::deadline_exceeded(symbol, kind, failures));
            }

            let error = match self.call(provider.as_ref(), symbol, kind).await {
                Ok(data) => {
                    if state.provider_index > 0 || state.attempt > 0 {
                        info!(
                            "Resolved {} for {} from {} after {} failed call(s)",
                            kind,
                            symbol,
                            provider_id,
                            failures.iter().map(|f| f.attempts).sum::<u32>() + state.attempt
                        );
                    }
                    return Ok(data);
                }
                Err(e) => e,
            };

            match state.on_failure(error, &self.policy) {
                Decision::Retry { after } if expired(after) => {
                    failures.push(state.advance(provider_id));
                    return Err(Self::deadline_exceeded(symbol, kind, failures));
                }
                Decision::Retry { after } => {
                    debug!(
                        "{} failed for {} (attempt {}), retrying in {:?}: {:?}",
                        provider_id, symbol, state.attempt, after, state.last_error
                    );
                    tokio::time::sleep(after).await;
                }
                Decision::Advance => {
                    let failure = state.advance(provider_id);
                    warn!("Provider {} gave up on {}: {}", provider_id, symbol, failure);
                    failures.push(failure);
                }
                Decision::Stop => {
                    failures.push(state.advance(provider_id));
                    break;
                }
            }
        }

        Err(MarketDataError::AllProvidersExhausted {
            symbol: symbol.to_string(),
            failures,
        })
    }

    fn deadline_exceeded(
        symbol: &str,
        kind: FetchKind,
        failures: Vec<ProviderFailure>,
    ) -> MarketDataError {
        warn!(
            "Deadline reached while resolving {} for {} after {} provider(s)",
            kind,
            symbol,
            failures.len()
        );
        MarketDataError::DeadlineExceeded {
            symbol: symbol.to_string(),
            failures,
        }
    }

    /// One bounded, validated call.
    async fn call(
        &self,
        provider: &dyn MarketDataProvider,
        symbol: &str,
        kind: FetchKind,
    ) -> Result<QuoteData, MarketDataError> {
        let timeout = provider.timeout();
        let data = tokio::time::timeout(timeout, provider.fetch(symbol, kind))
            .await
            .map_err(|_| {
                MarketDataError::unavailable(
                    provider.id(),
                    format!("no response within {:?}", timeout),
                )
            })??;

        if data.kind() != kind {
            return Err(MarketDataError::malformed(
                provider.id(),
                format!("expected {} payload, got {}", kind, data.kind()),
            ));
        }

        self.validator.validate(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IntradayQuote, QuotePayload};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider replaying a scripted list of outcomes, then succeeding.
    struct ScriptedProvider {
        id: &'static str,
        script: Mutex<VecDeque<MarketDataError>>,
        call_count: AtomicUsize,
        always_fail: Option<MarketDataError>,
        delay: Duration,
    }

    impl ScriptedProvider {
        fn new(id: &'static str, failures: Vec<MarketDataError>) -> Self {
            Self {
                id,
                script: Mutex::new(failures.into()),
                call_count: AtomicUsize::new(0),
                always_fail: None,
                delay: Duration::ZERO,
            }
        }

        fn failing(id: &'static str, error: MarketDataError) -> Self {
            Self {
                always_fail: Some(error),
                ..Self::new(id, vec![])
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn timeout(&self) -> Duration {
            Duration::from_secs(1)
        }

        async fn fetch(&self, symbol: &str, _kind: FetchKind) -> Result<QuoteData, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(error) = &self.always_fail {
                return Err(error.clone());
            }
            if let Some(error) = self.script.lock().unwrap().pop_front() {
                return Err(error);
            }
            Ok(QuoteData::new(
                symbol,
                self.id,
                QuotePayload::Intraday(IntradayQuote {
                    session_date: None,
                    timestamp: Utc::now(),
                    price: dec!(101.25),
                }),
            ))
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(5))
    }

    fn resolver(providers: Vec<Arc<ScriptedProvider>>) -> FallbackResolver {
        let chain: Vec<Arc<dyn MarketDataProvider>> = providers
            .into_iter()
            .map(|p| p as Arc<dyn MarketDataProvider>)
            .collect();
        FallbackResolver::new(chain, policy())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limited_with_backoff_then_succeeds() {
        let a = Arc::new(ScriptedProvider::new(
            "A",
            vec![
                MarketDataError::rate_limited("A"),
                MarketDataError::rate_limited("A"),
            ],
        ));
        let b = Arc::new(ScriptedProvider::new("B", vec![]));
        let resolver = resolver(vec![a.clone(), b.clone()]);

        let started = Instant::now();
        let data = resolver.resolve("AAPL", FetchKind::Intraday).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(data.source, "A");
        assert_eq!(a.calls(), 3);
        assert_eq!(b.calls(), 0);
        // 100ms + 200ms
        assert!(elapsed >= Duration::from_millis(300), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(350), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_moves_on_without_retry() {
        let a = Arc::new(ScriptedProvider::failing(
            "A",
            MarketDataError::not_found("A", "AAPL"),
        ));
        let b = Arc::new(ScriptedProvider::new("B", vec![]));
        let resolver = resolver(vec![a.clone(), b.clone()]);

        let started = Instant::now();
        let data = resolver.resolve("AAPL", FetchKind::Intraday).await.unwrap();

        assert_eq!(data.source, "B");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_chain_names_every_provider() {
        let a = Arc::new(ScriptedProvider::failing(
            "A",
            MarketDataError::unavailable("A", "HTTP 503"),
        ));
        let b = Arc::new(ScriptedProvider::failing(
            "B",
            MarketDataError::malformed("B", "missing close"),
        ));
        let resolver = resolver(vec![a.clone(), b.clone()]);

        let err = resolver
            .resolve("AAPL", FetchKind::Intraday)
            .await
            .unwrap_err();

        assert_eq!(a.calls(), 3);
        assert_eq!(b.calls(), 1);
        match err {
            MarketDataError::AllProvidersExhausted { symbol, failures } => {
                assert_eq!(symbol, "AAPL");
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].provider, "A");
                assert_eq!(failures[0].attempts, 3);
                assert!(failures[0].error.contains("HTTP 503"));
                assert_eq!(failures[1].provider, "B");
                assert_eq!(failures[1].attempts, 1);
                assert!(failures[1].error.contains("missing close"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out_as_unavailable() {
        let slow = Arc::new(ScriptedProvider {
            delay: Duration::from_secs(5),
            ..ScriptedProvider::new("SLOW", vec![])
        });
        let b = Arc::new(ScriptedProvider::new("B", vec![]));
        let resolver = resolver(vec![slow.clone(), b.clone()]);

        let data = resolver.resolve("AAPL", FetchKind::Intraday).await.unwrap();

        assert_eq!(data.source, "B");
        assert_eq!(slow.calls(), 3);
    }

    #[tokio::test]
    async fn test_kind_mismatch_is_malformed() {
        let a = Arc::new(ScriptedProvider::new("A", vec![]));
        let resolver = resolver(vec![a.clone()]);

        let err = resolver
            .resolve("AAPL", FetchKind::Opening)
            .await
            .unwrap_err();

        assert_eq!(a.calls(), 1);
        assert!(err.to_string().contains("expected OPENING payload"));
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let resolver = FallbackResolver::new(vec![], policy());
        let err = resolver
            .resolve("AAPL", FetchKind::Intraday)
            .await
            .unwrap_err();
        assert_eq!(err, MarketDataError::NoProviders);
    }

    #[test]
    fn test_attempt_state_advance_resets_counter() {
        let policy = policy();
        let mut state = AttemptState::default();

        let decision = state.on_failure(MarketDataError::rate_limited("A"), &policy);
        assert!(matches!(decision, Decision::Retry { .. }));
        assert_eq!(state.attempt, 1);

        let failure = state.advance("A");
        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.error, "Rate limited: A");
        assert_eq!(state.provider_index, 1);
        assert_eq!(state.attempt, 0);
        assert_eq!(state.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_retries_and_fallback() {
        let slow = Arc::new(ScriptedProvider {
            delay: Duration::from_millis(600),
            always_fail: Some(MarketDataError::unavailable("A", "HTTP 503")),
            ..ScriptedProvider::new("A", vec![])
        });
        let b = Arc::new(ScriptedProvider::new("B", vec![]));
        let resolver = resolver(vec![slow.clone(), b.clone()]);

        let started = Instant::now();
        let err = resolver
            .resolve_until("AAPL", FetchKind::Intraday, started + Duration::from_millis(500))
            .await
            .unwrap_err();

        // The call in flight finishes; nothing starts after the deadline.
        assert_eq!(slow.calls(), 1);
        assert_eq!(b.calls(), 0);
        assert!(started.elapsed() < Duration::from_millis(700));
        match err {
            MarketDataError::DeadlineExceeded { symbol, failures } => {
                assert_eq!(symbol, "AAPL");
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].attempts, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_past_deadline_is_not_slept() {
        let a = Arc::new(ScriptedProvider::new(
            "A",
            vec![MarketDataError::rate_limited("A"), MarketDataError::rate_limited("A")],
        ));
        let resolver = resolver(vec![a.clone()]);

        let started = Instant::now();
        let err = resolver
            .resolve_until("AAPL", FetchKind::Intraday, started + Duration::from_millis(150))
            .await
            .unwrap_err();

        // First retry (100ms) fits, the second (200ms) would overrun.
        assert_eq!(a.calls(), 2);
        assert!(started.elapsed() < Duration::from_millis(150));
        assert!(matches!(err, MarketDataError::DeadlineExceeded { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_leaves_fast_success_alone() {
        let a = Arc::new(ScriptedProvider::new("A", vec![]));
        let resolver = resolver(vec![a.clone()]);

        let data = resolver
            .resolve_until("AAPL", FetchKind::Intraday, Instant::now() + Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(data.source, "A");
    }
}
