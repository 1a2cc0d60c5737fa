//! Collected market data: stored rows, rolling statistics and the storage trait.

mod model;
mod rolling;
mod store;

#[cfg(test)]
pub(crate) mod memory;

pub use model::{
    BarPatch, DailyBar, IntradaySnapshot, MergedBar, RollingStats, SymbolIdentity, SymbolMetadata,
};
pub use rolling::{compute_rolling_stats, ROLLING_WINDOW};
pub use store::MarketStore;
