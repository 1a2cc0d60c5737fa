//! Marketfeed Core - collection pipeline, domain rows and storage traits.
//!
//! This crate contains the scheduling and reconciliation logic of the
//! collector. It is database-agnostic and defines the [`MarketStore`] trait
//! implemented by the `storage-sqlite` crate.
//!
//! ```text
//! Scheduler -> TaskRunner -> MarketCalendar gate -> FallbackResolver -> MarketStore
//! ```

pub mod calendar;
pub mod errors;
pub mod quotes;
pub mod schedule;
pub mod tasks;

pub use calendar::{CalendarConfig, MarketCalendar, SessionWindow, SkipReason};
pub use quotes::{
    BarPatch, DailyBar, IntradaySnapshot, MarketStore, RollingStats, SymbolIdentity,
    SymbolMetadata,
};
pub use schedule::{Schedule, ScheduleConfig, Scheduler};
pub use tasks::{
    FailureReason, LogSummarySink, NoOpSummarySink, RunSummary, RunnerConfig, SummarySink,
    SymbolOutcome, TaskKind, TaskRunner,
};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
