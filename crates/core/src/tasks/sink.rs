//! Run summary sink trait and implementations.

use std::sync::{Arc, Mutex};

use log::{info, warn};

use super::RunSummary;

/// Receives one summary record per task run.
///
/// `record()` must not block on I/O; it runs on the scheduler task.
pub trait SummarySink: Send + Sync {
    fn record(&self, summary: &RunSummary);
}

/// Writes each summary as a single JSON log record.
#[derive(Clone, Default)]
pub struct LogSummarySink;

impl SummarySink for LogSummarySink {
    fn record(&self, summary: &RunSummary) {
        match serde_json::to_string(summary) {
            Ok(json) => info!(target: "marketfeed::summary", "{}", json),
            Err(e) => warn!("Failed to serialize run summary for {}: {}", summary.task, e),
        }
    }
}

/// No-op implementation for contexts that don't need summaries.
#[derive(Clone, Default)]
pub struct NoOpSummarySink;

impl SummarySink for NoOpSummarySink {
    fn record(&self, _summary: &RunSummary) {}
}

/// Mock sink for testing - collects recorded summaries.
#[derive(Clone, Default)]
pub struct MockSummarySink {
    summaries: Arc<Mutex<Vec<RunSummary>>>,
}

impl MockSummarySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected summaries.
    pub fn summaries(&self) -> Vec<RunSummary> {
        self.lock().clone()
    }

    /// Clears collected summaries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Returns the number of collected summaries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no summaries have been collected.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RunSummary>> {
        self.summaries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SummarySink for MockSummarySink {
    fn record(&self, summary: &RunSummary) {
        self.lock().push(summary.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskKind;
    use chrono::Utc;

    fn summary() -> RunSummary {
        let now = Utc::now();
        RunSummary::completed(TaskKind::Metadata, now, now, false, vec![])
    }

    #[test]
    fn test_noop_and_log_sinks_do_not_panic() {
        NoOpSummarySink.record(&summary());
        LogSummarySink.record(&summary());
    }

    #[test]
    fn test_mock_sink_collects_summaries() {
        let sink = MockSummarySink::new();
        assert!(sink.is_empty());

        sink.record(&summary());
        sink.record(&summary());
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.summaries()[0].task, TaskKind::Metadata);

        sink.clear();
        assert!(sink.is_empty());
    }
}
