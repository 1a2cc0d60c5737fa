//! Per-run summary records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketfeed_market_data::{MarketDataError, ProviderFailure};

use super::TaskKind;
use crate::calendar::SkipReason;
use crate::errors::Error;

/// Why one symbol did not make it into the store during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum FailureReason {
    /// Every provider in the chain failed.
    AllProvidersExhausted { causes: Vec<ProviderFailure> },
    /// The resolver gave up without trying the chain (empty chain, bad payload).
    ProviderRejected { message: String },
    /// The write failed after the conflict retry.
    Persistence { message: String },
    /// The run deadline passed before the symbol was dispatched or resolved.
    Timeout,
}

impl FailureReason {
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::MarketData(MarketDataError::AllProvidersExhausted { failures, .. }) => {
                FailureReason::AllProvidersExhausted {
                    causes: failures.clone(),
                }
            }
            Error::MarketData(MarketDataError::DeadlineExceeded { .. }) => FailureReason::Timeout,
            Error::MarketData(e) => FailureReason::ProviderRejected {
                message: e.to_string(),
            },
            other => FailureReason::Persistence {
                message: other.to_string(),
            },
        }
    }
}

/// Result for a single symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum SymbolOutcome {
    Succeeded {
        symbol: String,
        /// Provider that supplied the data
        source: String,
        /// False when an intraday snapshot for the same minute already existed
        written: bool,
    },
    Failed {
        symbol: String,
        reason: FailureReason,
    },
}

impl SymbolOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            SymbolOutcome::Succeeded { symbol, .. } | SymbolOutcome::Failed { symbol, .. } => {
                symbol
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SymbolOutcome::Succeeded { .. })
    }
}

/// Structured record of one task run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub task: TaskKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub forced: bool,
    /// Set when the calendar gate skipped the run
    pub skipped: Option<SkipReason>,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<SymbolOutcome>,
}

impl RunSummary {
    pub(crate) fn skipped(
        task: TaskKind,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        reason: SkipReason,
    ) -> Self {
        Self {
            task,
            started_at,
            finished_at,
            forced: false,
            skipped: Some(reason),
            succeeded: 0,
            failed: 0,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn completed(
        task: TaskKind,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        forced: bool,
        mut outcomes: Vec<SymbolOutcome>,
    ) -> Self {
        outcomes.sort_by(|a, b| a.symbol().cmp(b.symbol()));
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            task,
            started_at,
            finished_at,
            forced,
            skipped: None,
            succeeded,
            failed: outcomes.len() - succeeded,
            outcomes,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    /// Failed symbols with their reasons.
    pub fn failures(&self) -> Vec<(&str, &FailureReason)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                SymbolOutcome::Failed { symbol, reason } => Some((symbol.as_str(), reason)),
                SymbolOutcome::Succeeded { .. } => None,
            })
            .collect()
    }
}
