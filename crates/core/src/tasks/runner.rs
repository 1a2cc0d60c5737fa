//! Task runner: calendar gate, per-symbol fan-out, persistence.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, Utc};
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use tokio::time::Instant;

use marketfeed_market_data::{FallbackResolver, MarketDataError, QuoteData, QuotePayload};

use super::sink::SummarySink;
use super::summary::{FailureReason, RunSummary, SymbolOutcome};
use super::TaskKind;
use crate::calendar::{CalendarConfig, MarketCalendar};
use crate::errors::{Error, Result};
use crate::quotes::{BarPatch, IntradaySnapshot, MarketStore, SymbolIdentity};

/// Settings for one runner.
#[derive(Clone, Debug, PartialEq)]
pub struct RunnerConfig {
    /// Tracked symbols, in configured order
    pub symbols: Vec<String>,
    /// Maximum symbols in flight at once
    pub pool_size: usize,
    /// Deadline for one run; symbols not yet dispatched or still fetching fail
    /// with `Timeout`
    pub run_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            pool_size: 4,
            run_timeout: Duration::from_secs(900),
        }
    }
}

/// Executes the collection tasks.
///
/// Symbols are isolated from each other: a failed fetch or write for one is
/// recorded in the run summary and never aborts the rest of the run. Only a
/// malformed calendar or an unreachable store fail the run itself.
pub struct TaskRunner {
    calendar: CalendarConfig,
    resolver: Arc<FallbackResolver>,
    store: Arc<dyn MarketStore>,
    sink: Arc<dyn SummarySink>,
    config: RunnerConfig,
}

impl TaskRunner {
    pub fn new(
        calendar: CalendarConfig,
        resolver: Arc<FallbackResolver>,
        store: Arc<dyn MarketStore>,
        sink: Arc<dyn SummarySink>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            calendar,
            resolver,
            store,
            sink,
            config,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.config.symbols
    }

    /// Run `kind` as of `now`.
    ///
    /// `force` bypasses the calendar gate for manual invocation. The summary is
    /// delivered to the sink and returned.
    ///
    /// # Errors
    ///
    /// Fails only when the calendar configuration is invalid or the store
    /// cannot be reached.
    pub async fn run(&self, kind: TaskKind, now: DateTime<Utc>, force: bool) -> Result<RunSummary> {
        let started_at = Utc::now();
        let calendar = MarketCalendar::from_config(&self.calendar)?;

        if !force {
            if let Some(reason) = calendar.skip_reason(now, kind.window()) {
                info!("Skipping {} task, not a trading moment: {}", kind, reason);
                let summary = RunSummary::skipped(kind, started_at, Utc::now(), reason);
                self.sink.record(&summary);
                return Ok(summary);
            }
        }

        self.store.ping().await?;

        info!(
            "Running {} task for {} symbol(s){}",
            kind,
            self.config.symbols.len(),
            if force { " (forced)" } else { "" }
        );

        let deadline = Instant::now() + self.config.run_timeout;
        let calendar = &calendar;
        let outcomes: Vec<SymbolOutcome> = stream::iter(self.config.symbols.clone())
            .map(move |symbol| async move {
                if Instant::now() >= deadline {
                    warn!("{} task deadline passed before {} was dispatched", kind, symbol);
                    return SymbolOutcome::Failed {
                        symbol,
                        reason: FailureReason::Timeout,
                    };
                }
                self.run_symbol(kind, &symbol, calendar, now, deadline).await
            })
            .buffer_unordered(self.config.pool_size.max(1))
            .collect()
            .await;

        let summary = RunSummary::completed(kind, started_at, Utc::now(), force, outcomes);
        if summary.failed > 0 {
            warn!(
                "{} task finished: {} succeeded, {} failed",
                kind, summary.succeeded, summary.failed
            );
        } else {
            info!("{} task finished: {} succeeded", kind, summary.succeeded);
        }
        self.sink.record(&summary);
        Ok(summary)
    }

    async fn run_symbol(
        &self,
        kind: TaskKind,
        symbol: &str,
        calendar: &MarketCalendar,
        now: DateTime<Utc>,
        deadline: Instant,
    ) -> SymbolOutcome {
        let data = match self
            .resolver
            .resolve_until(symbol, kind.fetch_kind(), deadline)
            .await
        {
            Ok(data) => data,
            Err(e) => {
                warn!("{} fetch failed for {}: {}", kind, symbol, e);
                return SymbolOutcome::Failed {
                    symbol: symbol.to_string(),
                    reason: FailureReason::from_error(&Error::MarketData(e)),
                };
            }
        };

        if let Err(e) = check_session(calendar, now, &data) {
            warn!("{} quote for {} rejected: {}", kind, symbol, e);
            return SymbolOutcome::Failed {
                symbol: symbol.to_string(),
                reason: FailureReason::from_error(&Error::MarketData(e)),
            };
        }

        let written = match self.persist(calendar, now, &data).await {
            Err(e) if e.is_persistence_conflict() => {
                debug!("Write conflict for {}, retrying once: {}", symbol, e);
                self.persist(calendar, now, &data).await
            }
            other => other,
        };

        match written {
            Ok(written) => SymbolOutcome::Succeeded {
                symbol: symbol.to_string(),
                source: data.source,
                written,
            },
            Err(e) => {
                error!("{} write failed for {}: {}", kind, symbol, e);
                SymbolOutcome::Failed {
                    symbol: symbol.to_string(),
                    reason: FailureReason::from_error(&e),
                }
            }
        }
    }

    /// Write one fetched payload. Returns false when nothing new was stored.
    async fn persist(
        &self,
        calendar: &MarketCalendar,
        now: DateTime<Utc>,
        data: &QuoteData,
    ) -> Result<bool> {
        let date = calendar.local_date(now);

        match &data.payload {
            QuotePayload::Metadata(profile) => {
                let identity = SymbolIdentity::from_profile(&data.symbol, profile);
                let history = profile
                    .history
                    .iter()
                    .map(|q| BarPatch::from_daily_quote(&data.symbol, q))
                    .collect();
                self.store.refresh_symbol(identity, history, date).await?;
                Ok(true)
            }
            QuotePayload::Opening(quote) => {
                let patch = BarPatch::new(&data.symbol, date).open(quote.open);
                self.store.upsert_daily_bar(patch, date).await?;
                Ok(true)
            }
            QuotePayload::Closing(quote) => {
                let patch = BarPatch::new(&data.symbol, date).close(
                    quote.close,
                    quote.high,
                    quote.low,
                    quote.volume,
                );
                self.store.upsert_daily_bar(patch, date).await?;
                Ok(true)
            }
            QuotePayload::Intraday(quote) => {
                let snapshot = IntradaySnapshot {
                    symbol: data.symbol.clone(),
                    captured_at: now
                        .duration_trunc(chrono::Duration::minutes(1))
                        .unwrap_or(now),
                    price: quote.price,
                    source: data.source.clone(),
                };
                self.store.append_snapshot(snapshot).await
            }
        }
    }
}

/// Daily-bar payloads must belong to the trading day being written, otherwise
/// an earlier session's figures would land in today's bar.
fn check_session(
    calendar: &MarketCalendar,
    now: DateTime<Utc>,
    data: &QuoteData,
) -> std::result::Result<(), MarketDataError> {
    let (session_date, timestamp) = match &data.payload {
        QuotePayload::Opening(quote) => (quote.session_date, quote.timestamp),
        QuotePayload::Closing(quote) => (quote.session_date, quote.timestamp),
        // Snapshots are keyed by capture minute, history rows carry their own dates
        QuotePayload::Intraday(_) | QuotePayload::Metadata(_) => return Ok(()),
    };

    let expected = calendar.local_date(now);
    let session = session_date.unwrap_or_else(|| calendar.local_date(timestamp));
    if session != expected {
        return Err(MarketDataError::malformed(
            &data.source,
            format!("stale quote for {}, expected {}", session, expected),
        ));
    }
    Ok(())
}
