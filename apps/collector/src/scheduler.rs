//! Wall-clock loop driving the collection tasks.
//!
//! Sleeps until the next trigger, runs the due tasks one after another, and
//! repeats until shutdown.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use marketfeed_core::Scheduler;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Triggers missed by more than this are dropped instead of run late.
const MAX_LATENESS_MINS: i64 = 15;

/// What to do with a trigger once its instant has been reached.
#[derive(Debug, PartialEq, Eq)]
enum Dispatch {
    Fire,
    Drop,
}

fn dispatch(at: DateTime<Utc>, now: DateTime<Utc>) -> Dispatch {
    if now - at > Duration::minutes(MAX_LATENESS_MINS) {
        Dispatch::Drop
    } else {
        Dispatch::Fire
    }
}

fn until(at: DateTime<Utc>) -> std::time::Duration {
    (at - Utc::now()).to_std().unwrap_or_default()
}

/// Starts the collection loop. It stops when `shutdown` flips to `true` or
/// the calendar has no further trading day to offer.
pub fn start_collection_scheduler(
    scheduler: Arc<Scheduler>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Collection scheduler started");
        let mut cursor = Utc::now();

        loop {
            let Some((at, kinds)) = scheduler.schedule().next_after(cursor) else {
                warn!(
                    "No upcoming trading day after {}; extend MF_HOLIDAYS to keep collecting",
                    cursor
                );
                break;
            };
            let names: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
            info!("Next trigger at {}: {}", at, names.join(", "));

            tokio::select! {
                _ = tokio::time::sleep(until(at)) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            cursor = at;
            match dispatch(at, Utc::now()) {
                Dispatch::Fire => {
                    scheduler.fire(at, &kinds).await;
                }
                Dispatch::Drop => {
                    warn!("Dropping trigger at {} ({}); it is too far in the past", at, names.join(", "));
                }
            }
        }

        info!("Collection scheduler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_late_triggers_are_dropped() {
        let at = Utc.with_ymd_and_hms(2025, 3, 5, 14, 35, 0).unwrap();
        assert_eq!(dispatch(at, at), Dispatch::Fire);
        assert_eq!(dispatch(at, at + Duration::minutes(15)), Dispatch::Fire);
        assert_eq!(dispatch(at, at + Duration::minutes(16)), Dispatch::Drop);
    }

    #[test]
    fn test_past_instant_sleeps_zero() {
        let past = Utc::now() - Duration::seconds(5);
        assert_eq!(until(past), std::time::Duration::ZERO);
    }
}
