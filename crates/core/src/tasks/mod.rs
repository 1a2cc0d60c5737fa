//! The four collection tasks and the runner that executes them.

mod runner;
mod sink;
mod summary;

pub use runner::{RunnerConfig, TaskRunner};
pub use sink::{LogSummarySink, MockSummarySink, NoOpSummarySink, SummarySink};
pub use summary::{FailureReason, RunSummary, SymbolOutcome};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use marketfeed_market_data::FetchKind;

use crate::calendar::SessionWindow;
use crate::errors::Error;

/// Units of work, identified 1 to 4 on the trigger surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Refresh identity and rolling statistics
    Metadata,
    /// Write the open of the day's bar
    Opening,
    /// Complete the day's bar
    Closing,
    /// Append a price snapshot
    Intraday,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Metadata,
        TaskKind::Opening,
        TaskKind::Closing,
        TaskKind::Intraday,
    ];

    pub fn id(&self) -> u8 {
        match self {
            TaskKind::Metadata => 1,
            TaskKind::Opening => 2,
            TaskKind::Closing => 3,
            TaskKind::Intraday => 4,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }

    /// Calendar gate the task runs behind.
    pub fn window(&self) -> SessionWindow {
        match self {
            TaskKind::Metadata => SessionWindow::TradingDay,
            TaskKind::Opening => SessionWindow::Opening,
            TaskKind::Closing => SessionWindow::Closing,
            TaskKind::Intraday => SessionWindow::Intraday,
        }
    }

    pub fn fetch_kind(&self) -> FetchKind {
        match self {
            TaskKind::Metadata => FetchKind::Metadata,
            TaskKind::Opening => FetchKind::Opening,
            TaskKind::Closing => FetchKind::Closing,
            TaskKind::Intraday => FetchKind::Intraday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Metadata => "METADATA",
            TaskKind::Opening => "OPENING",
            TaskKind::Closing => "CLOSING",
            TaskKind::Intraday => "INTRADAY",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = Error;

    /// Accepts the numeric id or the name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u8>() {
            return Self::from_id(id)
                .ok_or_else(|| Error::InvalidConfigValue(format!("unknown task id {}", id)));
        }
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidConfigValue(format!("unknown task '{}'", s)))
    }
}
