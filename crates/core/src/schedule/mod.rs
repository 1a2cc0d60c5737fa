//! Wall-clock triggers and sequential execution of due tasks.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use log::{error, info};

use crate::calendar::{CalendarConfig, MarketCalendar};
use crate::errors::{Error, Result};
use crate::tasks::{RunSummary, TaskKind, TaskRunner};

/// Days searched ahead for the next trading day.
const LOOKAHEAD_DAYS: i64 = 14;

/// Trigger times, in exchange-local time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Metadata refresh, once per trading day before the open
    pub metadata_at: NaiveTime,
    /// Intraday capture cadence from the open until the close
    pub intraday_interval_mins: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            metadata_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            intraday_interval_mins: 15,
        }
    }
}

/// Computes when each task is due.
///
/// Opening and closing triggers sit at the start of their calendar capture
/// windows, so a trigger fired on time always passes the calendar gate.
#[derive(Clone, Debug)]
pub struct Schedule {
    calendar: MarketCalendar,
    config: ScheduleConfig,
}

impl Schedule {
    pub fn new(calendar: &CalendarConfig, config: ScheduleConfig) -> Result<Self> {
        if config.intraday_interval_mins == 0 {
            return Err(Error::InvalidConfigValue(
                "intraday interval must be at least one minute".to_string(),
            ));
        }
        Ok(Self {
            calendar: MarketCalendar::from_config(calendar)?,
            config,
        })
    }

    /// Local trigger times of one trading day.
    fn triggers(&self) -> Vec<(NaiveTime, TaskKind)> {
        let mut triggers = vec![
            (self.config.metadata_at, TaskKind::Metadata),
            (self.calendar.opening_start(), TaskKind::Opening),
            (self.calendar.closing_start(), TaskKind::Closing),
        ];

        let step = Duration::minutes(i64::from(self.config.intraday_interval_mins));
        let mut at = self.calendar.session_open();
        while at < self.calendar.session_close() {
            triggers.push((at, TaskKind::Intraday));
            let (next, wrapped) = at.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            at = next;
        }
        triggers
    }

    fn due_on(&self, date: NaiveDate) -> Vec<(DateTime<Utc>, TaskKind)> {
        if !self.calendar.is_trading_day(date) {
            return Vec::new();
        }
        self.triggers()
            .into_iter()
            .filter_map(|(time, kind)| Some((self.calendar.at_local(date, time)?, kind)))
            .collect()
    }

    /// Next instant strictly after `after` at which tasks are due, with those
    /// tasks ordered by identifier.
    ///
    /// Returns `None` when no trading day lies within the lookahead, e.g. when
    /// the holiday calendar runs out.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<(DateTime<Utc>, Vec<TaskKind>)> {
        let first = self.calendar.local_date(after);

        (0..LOOKAHEAD_DAYS).find_map(|offset| {
            let date = first + Duration::days(offset);
            let upcoming: Vec<(DateTime<Utc>, TaskKind)> = self
                .due_on(date)
                .into_iter()
                .filter(|(at, _)| *at > after)
                .collect();

            let next = upcoming.iter().map(|(at, _)| *at).min()?;
            let mut kinds: Vec<TaskKind> = upcoming
                .into_iter()
                .filter(|(at, _)| *at == next)
                .map(|(_, kind)| kind)
                .collect();
            kinds.sort();
            kinds.dedup();
            Some((next, kinds))
        })
    }
}

/// Runs due tasks one after another.
pub struct Scheduler {
    runner: Arc<TaskRunner>,
    schedule: Schedule,
}

impl Scheduler {
    pub fn new(runner: Arc<TaskRunner>, schedule: Schedule) -> Self {
        Self { runner, schedule }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Run `kinds` sequentially as of `at`.
    ///
    /// A fatal error in one task is logged and does not stop the tasks after it.
    pub async fn fire(
        &self,
        at: DateTime<Utc>,
        kinds: &[TaskKind],
    ) -> Vec<(TaskKind, Result<RunSummary>)> {
        let mut results = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            let result = self.runner.run(kind, at, false).await;
            match &result {
                Ok(summary) if summary.is_skipped() => {}
                Ok(summary) => info!(
                    "Scheduled {} run done: {} succeeded, {} failed",
                    kind, summary.succeeded, summary.failed
                ),
                Err(e) => error!("Scheduled {} run failed: {}", kind, e),
            }
            results.push((kind, result));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::memory::MemoryStore;
    use crate::tasks::{MockSummarySink, RunnerConfig};
    use chrono::TimeZone;
    use marketfeed_market_data::{FallbackResolver, RetryPolicy};

    fn schedule() -> Schedule {
        Schedule::new(&CalendarConfig::default(), ScheduleConfig::default()).unwrap()
    }

    /// New York wall clock for dates in EST (UTC-5).
    fn est(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
            + Duration::hours(i64::from(h) + 5)
            + Duration::minutes(i64::from(min))
    }

    #[test]
    fn test_day_sequence() {
        let schedule = schedule();
        // Tuesday 2025-03-04 evening -> Wednesday morning.
        let (at, kinds) = schedule.next_after(est(2025, 3, 4, 19, 0)).unwrap();
        assert_eq!(at, est(2025, 3, 5, 9, 0));
        assert_eq!(kinds, vec![TaskKind::Metadata]);

        let (at, kinds) = schedule.next_after(at).unwrap();
        assert_eq!(at, est(2025, 3, 5, 9, 30));
        assert_eq!(kinds, vec![TaskKind::Intraday]);

        let (at, kinds) = schedule.next_after(at).unwrap();
        assert_eq!(at, est(2025, 3, 5, 9, 35));
        assert_eq!(kinds, vec![TaskKind::Opening]);

        let (at, _) = schedule.next_after(at).unwrap();
        assert_eq!(at, est(2025, 3, 5, 9, 45));
    }

    #[test]
    fn test_last_intraday_then_closing() {
        let schedule = schedule();
        let (at, kinds) = schedule.next_after(est(2025, 3, 5, 15, 40)).unwrap();
        assert_eq!(at, est(2025, 3, 5, 15, 45));
        assert_eq!(kinds, vec![TaskKind::Intraday]);

        // No intraday trigger at the close itself.
        let (at, kinds) = schedule.next_after(at).unwrap();
        assert_eq!(at, est(2025, 3, 5, 16, 5));
        assert_eq!(kinds, vec![TaskKind::Closing]);
    }

    #[test]
    fn test_coinciding_triggers_are_ordered_by_id() {
        let config = ScheduleConfig {
            intraday_interval_mins: 5,
            ..ScheduleConfig::default()
        };
        let schedule = Schedule::new(&CalendarConfig::default(), config).unwrap();

        let (at, kinds) = schedule.next_after(est(2025, 3, 5, 9, 30)).unwrap();
        assert_eq!(at, est(2025, 3, 5, 9, 35));
        assert_eq!(kinds, vec![TaskKind::Opening, TaskKind::Intraday]);
    }

    #[test]
    fn test_weekend_and_holiday_are_skipped() {
        let schedule = schedule();
        // Friday 2025-04-18 is Good Friday; next trading day is Monday 2025-04-21 (EDT).
        let after = Utc.with_ymd_and_hms(2025, 4, 17, 23, 0, 0).unwrap();
        let (at, kinds) = schedule.next_after(after).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 4, 21, 13, 0, 0).unwrap());
        assert_eq!(kinds, vec![TaskKind::Metadata]);
    }

    #[test]
    fn test_uncovered_years_have_no_triggers() {
        let schedule = schedule();
        let after = Utc.with_ymd_and_hms(2030, 3, 6, 0, 0, 0).unwrap();
        assert_eq!(schedule.next_after(after), None);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = ScheduleConfig {
            intraday_interval_mins: 0,
            ..ScheduleConfig::default()
        };
        assert!(matches!(
            Schedule::new(&CalendarConfig::default(), config),
            Err(Error::InvalidConfigValue(_))
        ));
    }

    #[tokio::test]
    async fn test_fire_continues_after_fatal_task() {
        let store = MemoryStore::new();
        store.set_unreachable(true);
        let sink = MockSummarySink::new();
        let runner = TaskRunner::new(
            CalendarConfig::default(),
            Arc::new(FallbackResolver::new(vec![], RetryPolicy::default())),
            Arc::new(store.clone()),
            Arc::new(sink.clone()),
            RunnerConfig {
                symbols: vec!["AAPL".to_string()],
                ..RunnerConfig::default()
            },
        );
        let scheduler = Scheduler::new(Arc::new(runner), schedule());

        // Opening fails on the unreachable store; intraday at 9:35 still runs.
        let results = scheduler
            .fire(
                est(2025, 3, 5, 9, 35),
                &[TaskKind::Opening, TaskKind::Intraday],
            )
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, TaskKind::Opening);
        assert!(results[0].1.is_err());
        assert_eq!(results[1].0, TaskKind::Intraday);
        assert!(results[1].1.is_err());
        assert!(sink.is_empty());

        // Once the store is back the same trigger completes.
        store.set_unreachable(false);
        let results = scheduler
            .fire(est(2025, 3, 5, 9, 35), &[TaskKind::Opening])
            .await;
        let summary = results[0].1.as_ref().unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(sink.len(), 1);
    }
}
