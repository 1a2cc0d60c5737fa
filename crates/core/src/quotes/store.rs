//! Market data storage traits.
//!
//! This module defines the persistence interface the task runner writes
//! through. Implementations own all three tables and keep the rolling
//! statistics in step with the stored bars.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::model::{BarPatch, DailyBar, IntradaySnapshot, SymbolIdentity, SymbolMetadata};
use crate::errors::Result;

/// Storage interface for collected market data.
///
/// # Design Notes
///
/// - Async methods are the writes; each one is a single transaction scoped
///   to one symbol
/// - Sync methods are simple reads
/// - Every write that touches daily bars recomputes the symbol's rolling
///   statistics inside the same transaction
#[async_trait]
pub trait MarketStore: Send + Sync {
    // =========================================================================
    // Health
    // =========================================================================

    /// Round-trips the database. Fails with a connection-level error when
    /// the store is unreachable.
    async fn ping(&self) -> Result<()>;

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Upserts the symbol's identity, merges `history` into its daily bars
    /// and recomputes its rolling statistics.
    ///
    /// `as_of` is the exchange-local date of the run.
    async fn refresh_symbol(
        &self,
        identity: SymbolIdentity,
        history: Vec<BarPatch>,
        as_of: NaiveDate,
    ) -> Result<SymbolMetadata>;

    /// Merges a partial bar into the row for (symbol, date), creating the
    /// symbol on first sighting, then recomputes rolling statistics.
    async fn upsert_daily_bar(&self, patch: BarPatch, as_of: NaiveDate) -> Result<DailyBar>;

    /// Appends a snapshot. Returns `false` when a row for
    /// (symbol, captured_at) already existed and nothing was written.
    async fn append_snapshot(&self, snapshot: IntradaySnapshot) -> Result<bool>;

    // =========================================================================
    // Reads
    // =========================================================================

    fn get_metadata(&self, symbol: &str) -> Result<Option<SymbolMetadata>>;

    fn get_daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>>;

    /// Bars in `[start, end]`, oldest first.
    fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>>;

    /// Snapshots in `[start, end]`, oldest first.
    fn get_snapshots(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<IntradaySnapshot>>;
}
