//! Market data tables: symbols, daily bars, intraday snapshots.

mod model;
mod repository;

pub use model::{DailyBarDB, IntradaySnapshotDB, SymbolDB};
pub use repository::MarketRepository;
