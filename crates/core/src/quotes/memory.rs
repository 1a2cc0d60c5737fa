//! In-memory `MarketStore` used by the runner and scheduler tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::model::{
    BarPatch, DailyBar, IntradaySnapshot, MergedBar, SymbolIdentity, SymbolMetadata,
};
use super::rolling::compute_rolling_stats;
use super::store::MarketStore;
use crate::errors::{DatabaseError, Error, Result};

#[derive(Default)]
struct State {
    symbols: BTreeMap<String, SymbolMetadata>,
    bars: BTreeMap<(String, NaiveDate), DailyBar>,
    snapshots: BTreeMap<(String, DateTime<Utc>), IntradaySnapshot>,
}

#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    state: Arc<Mutex<State>>,
    unreachable: Arc<Mutex<bool>>,
    /// Remaining injected conflicts per symbol
    conflicts: Arc<Mutex<HashMap<String, u32>>>,
    broken_symbols: Arc<Mutex<HashSet<String>>>,
    writes: Arc<Mutex<u32>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.lock().unwrap() = unreachable;
    }

    /// Next `count` writes for `symbol` fail with a unique violation.
    pub(crate) fn inject_conflicts(&self, symbol: &str, count: u32) {
        self.conflicts
            .lock()
            .unwrap()
            .insert(symbol.to_string(), count);
    }

    /// Every write for `symbol` fails with a query error.
    pub(crate) fn break_symbol(&self, symbol: &str) {
        self.broken_symbols
            .lock()
            .unwrap()
            .insert(symbol.to_string());
    }

    pub(crate) fn write_count(&self) -> u32 {
        *self.writes.lock().unwrap()
    }

    pub(crate) fn snapshot_count(&self) -> usize {
        self.state.lock().unwrap().snapshots.len()
    }

    pub(crate) fn insert_bar(&self, bar: DailyBar) {
        let mut state = self.state.lock().unwrap();
        state.bars.insert((bar.symbol.clone(), bar.date), bar);
    }

    fn begin_write(&self, symbol: &str) -> Result<()> {
        *self.writes.lock().unwrap() += 1;

        if self.broken_symbols.lock().unwrap().contains(symbol) {
            return Err(Error::Database(DatabaseError::QueryFailed(format!(
                "write rejected for {}",
                symbol
            ))));
        }

        let mut conflicts = self.conflicts.lock().unwrap();
        if let Some(remaining) = conflicts.get_mut(symbol) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Database(DatabaseError::UniqueViolation(format!(
                    "daily_bars.symbol = {}",
                    symbol
                ))));
            }
        }
        Ok(())
    }

    fn ensure_symbol(state: &mut State, identity: &SymbolIdentity, now: DateTime<Utc>) {
        let row = state
            .symbols
            .entry(identity.symbol.clone())
            .or_insert_with(|| SymbolMetadata {
                symbol: identity.symbol.clone(),
                exchange: None,
                security_type: None,
                cap_category: None,
                stats: Default::default(),
                created_at: now,
                updated_at: now,
            });

        if let Some(exchange) = &identity.exchange {
            row.exchange = Some(exchange.clone());
        }
        if let Some(security_type) = &identity.security_type {
            row.security_type = Some(security_type.clone());
        }
        if let Some(cap) = &identity.cap_category {
            row.cap_category = Some(cap.clone());
        }
        row.updated_at = now;
    }

    fn merge_bar(state: &mut State, patch: &BarPatch, now: DateTime<Utc>) -> DailyBar {
        let key = (patch.symbol.clone(), patch.date);
        let merged = MergedBar::merge(state.bars.get(&key), patch);
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
        state.bars.insert(key, bar.clone());
        bar
    }

    fn recompute(state: &mut State, symbol: &str, as_of: NaiveDate) {
        let bars: Vec<DailyBar> = state
            .bars
            .values()
            .filter(|b| b.symbol == symbol)
            .cloned()
            .collect();
        if let Some(row) = state.symbols.get_mut(symbol) {
            row.stats = compute_rolling_stats(&bars, as_of);
        }
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        if *self.unreachable.lock().unwrap() {
            return Err(Error::Database(DatabaseError::ConnectionFailed(
                "store unreachable".to_string(),
            )));
        }
        Ok(())
    }

    async fn refresh_symbol(
        &self,
        identity: SymbolIdentity,
        history: Vec<BarPatch>,
        as_of: NaiveDate,
    ) -> Result<SymbolMetadata> {
        self.begin_write(&identity.symbol)?;
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();

        Self::ensure_symbol(&mut state, &identity, now);
        for patch in history.iter().filter(|p| !p.is_empty()) {
            Self::merge_bar(&mut state, patch, now);
        }
        Self::recompute(&mut state, &identity.symbol, as_of);

        state
            .symbols
            .get(&identity.symbol)
            .cloned()
            .ok_or_else(|| Error::Unexpected("symbol vanished".to_string()))
    }

    async fn upsert_daily_bar(&self, patch: BarPatch, as_of: NaiveDate) -> Result<DailyBar> {
        self.begin_write(&patch.symbol)?;
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();

        Self::ensure_symbol(&mut state, &SymbolIdentity::bare(&patch.symbol), now);
        let bar = Self::merge_bar(&mut state, &patch, now);
        Self::recompute(&mut state, &patch.symbol, as_of);
        Ok(bar)
    }

    async fn append_snapshot(&self, snapshot: IntradaySnapshot) -> Result<bool> {
        self.begin_write(&snapshot.symbol)?;
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();

        Self::ensure_symbol(&mut state, &SymbolIdentity::bare(&snapshot.symbol), now);
        let key = (snapshot.symbol.clone(), snapshot.captured_at);
        if state.snapshots.contains_key(&key) {
            return Ok(false);
        }
        state.snapshots.insert(key, snapshot);
        Ok(true)
    }

    fn get_metadata(&self, symbol: &str) -> Result<Option<SymbolMetadata>> {
        Ok(self.state.lock().unwrap().symbols.get(symbol).cloned())
    }

    fn get_daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .bars
            .get(&(symbol.to_string(), date))
            .cloned())
    }

    fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .bars
            .values()
            .filter(|b| b.symbol == symbol && b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }

    fn get_snapshots(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<IntradaySnapshot>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .snapshots
            .values()
            .filter(|s| s.symbol == symbol && s.captured_at >= start && s.captured_at <= end)
            .cloned()
            .collect())
    }
}
