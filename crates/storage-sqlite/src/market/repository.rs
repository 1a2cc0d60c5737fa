use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use super::model::{
    format_date, format_timestamp, DailyBarDB, IntradaySnapshotDB, RollingStatsDB, SymbolDB,
    SymbolIdentityUpdateDB,
};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::IntoCore;
use crate::schema::daily_bars::dsl as bars_dsl;
use crate::schema::intraday_snapshots::dsl as snapshots_dsl;
use crate::schema::symbols::dsl as symbols_dsl;
use marketfeed_core::quotes::{
    compute_rolling_stats, BarPatch, DailyBar, IntradaySnapshot, MarketStore, MergedBar,
    SymbolIdentity, SymbolMetadata,
};
use marketfeed_core::Result;

/// SQLite implementation of [`MarketStore`].
///
/// Reads use pooled connections; every write method is one job on the
/// writer actor and therefore one transaction covering a single symbol.
pub struct MarketRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl MarketRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

// =============================================================================
// Write helpers (run inside the writer's transaction)
// =============================================================================

/// Create the symbol row on first sighting, otherwise apply the known identity
/// fields. Never deletes and re-inserts, so child rows are untouched.
fn ensure_symbol(
    conn: &mut SqliteConnection,
    identity: &SymbolIdentity,
    now: DateTime<Utc>,
) -> Result<()> {
    let updated = diesel::update(symbols_dsl::symbols.find(&identity.symbol))
        .set(&SymbolIdentityUpdateDB::new(identity, now))
        .execute(conn)
        .into_core()?;

    if updated == 0 {
        diesel::insert_into(symbols_dsl::symbols)
            .values(&SymbolDB::first_sighting(identity, now))
            .execute(conn)
            .into_core()?;
    }
    Ok(())
}

fn load_bar(conn: &mut SqliteConnection, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>> {
    let row = bars_dsl::daily_bars
        .find((symbol, format_date(date)))
        .select(DailyBarDB::as_select())
        .first::<DailyBarDB>(conn)
        .optional()
        .into_core()?;

    Ok(row.map(DailyBar::try_from).transpose()?)
}

fn merge_bar(conn: &mut SqliteConnection, patch: &BarPatch, now: DateTime<Utc>) -> Result<DailyBar> {
    let existing = load_bar(conn, &patch.symbol, patch.date)?;
    let merged = MergedBar::merge(existing.as_ref(), patch);

    let bar = DailyBar {
        symbol: patch.symbol.clone(),
        date: patch.date,
        open: merged.open,
        high: merged.high,
        low: merged.low,
        close: merged.close,
        volume: merged.volume,
        updated_at: now,
    };

    diesel::replace_into(bars_dsl::daily_bars)
        .values(&DailyBarDB::from(&bar))
        .execute(conn)
        .into_core()?;

    Ok(bar)
}

/// Recompute the rolling statistics of `symbol` from its stored bars.
fn recompute_stats(conn: &mut SqliteConnection, symbol: &str, as_of: NaiveDate) -> Result<()> {
    let bars = bars_dsl::daily_bars
        .filter(bars_dsl::symbol.eq(symbol))
        .filter(bars_dsl::date.le(format_date(as_of)))
        .order(bars_dsl::date.asc())
        .select(DailyBarDB::as_select())
        .load::<DailyBarDB>(conn)
        .into_core()?
        .into_iter()
        .map(DailyBar::try_from)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let stats = compute_rolling_stats(&bars, as_of);

    diesel::update(symbols_dsl::symbols.find(symbol))
        .set(&RollingStatsDB::from(&stats))
        .execute(conn)
        .into_core()?;
    Ok(())
}

fn load_metadata(conn: &mut SqliteConnection, symbol: &str) -> Result<Option<SymbolMetadata>> {
    let row = symbols_dsl::symbols
        .find(symbol)
        .select(SymbolDB::as_select())
        .first::<SymbolDB>(conn)
        .optional()
        .into_core()?;

    Ok(row.map(SymbolMetadata::try_from).transpose()?)
}

// =============================================================================
// MarketStore Implementation
// =============================================================================

#[async_trait]
impl MarketStore for MarketRepository {
    async fn ping(&self) -> Result<()> {
        let mut conn = get_connection(&self.pool)?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .into_core()?;
        Ok(())
    }

    async fn refresh_symbol(
        &self,
        identity: SymbolIdentity,
        history: Vec<BarPatch>,
        as_of: NaiveDate,
    ) -> Result<SymbolMetadata> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SymbolMetadata> {
                let now = Utc::now();
                ensure_symbol(conn, &identity, now)?;
                for patch in history.iter().filter(|p| !p.is_empty()) {
                    merge_bar(conn, patch, now)?;
                }
                recompute_stats(conn, &identity.symbol, as_of)?;

                load_metadata(conn, &identity.symbol)?.ok_or_else(|| {
                    marketfeed_core::Error::Unexpected(format!(
                        "symbol {} missing after upsert",
                        identity.symbol
                    ))
                })
            })
            .await
    }

    async fn upsert_daily_bar(&self, patch: BarPatch, as_of: NaiveDate) -> Result<DailyBar> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<DailyBar> {
                let now = Utc::now();
                ensure_symbol(conn, &SymbolIdentity::bare(&patch.symbol), now)?;
                let bar = merge_bar(conn, &patch, now)?;
                recompute_stats(conn, &patch.symbol, as_of)?;
                Ok(bar)
            })
            .await
    }

    async fn append_snapshot(&self, snapshot: IntradaySnapshot) -> Result<bool> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                ensure_symbol(conn, &SymbolIdentity::bare(&snapshot.symbol), Utc::now())?;
                let inserted = diesel::insert_or_ignore_into(snapshots_dsl::intraday_snapshots)
                    .values(&IntradaySnapshotDB::from(&snapshot))
                    .execute(conn)
                    .into_core()?;
                Ok(inserted > 0)
            })
            .await
    }

    fn get_metadata(&self, symbol: &str) -> Result<Option<SymbolMetadata>> {
        let mut conn = get_connection(&self.pool)?;
        load_metadata(&mut conn, symbol)
    }

    fn get_daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>> {
        let mut conn = get_connection(&self.pool)?;
        load_bar(&mut conn, symbol, date)
    }

    fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = bars_dsl::daily_bars
            .filter(bars_dsl::symbol.eq(symbol))
            .filter(bars_dsl::date.ge(format_date(start)))
            .filter(bars_dsl::date.le(format_date(end)))
            .order(bars_dsl::date.asc())
            .select(DailyBarDB::as_select())
            .load::<DailyBarDB>(&mut conn)
            .into_core()?;

        Ok(rows
            .into_iter()
            .map(DailyBar::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn get_snapshots(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<IntradaySnapshot>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = snapshots_dsl::intraday_snapshots
            .filter(snapshots_dsl::symbol.eq(symbol))
            .filter(snapshots_dsl::captured_at.ge(format_timestamp(start)))
            .filter(snapshots_dsl::captured_at.le(format_timestamp(end)))
            .order(snapshots_dsl::captured_at.asc())
            .select(IntradaySnapshotDB::as_select())
            .load::<IntradaySnapshotDB>(&mut conn)
            .into_core()?;

        Ok(rows
            .into_iter()
            .map(IntradaySnapshot::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
