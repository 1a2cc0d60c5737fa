//! Property-based tests for the market calendar and the daily bar merge.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use proptest::prelude::*;
use rust_decimal::Decimal;

use marketfeed_core::calendar::{us_exchange_holidays, CalendarConfig, MarketCalendar};
use marketfeed_core::quotes::{BarPatch, DailyBar, MergedBar};
use marketfeed_core::SessionWindow;

// =============================================================================
// Generators
// =============================================================================

fn arb_price() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_bar_fields() -> impl Strategy<
    Value = (
        Option<Decimal>,
        Option<Decimal>,
        Option<Decimal>,
        Option<Decimal>,
        Option<i64>,
    ),
> {
    (
        proptest::option::of(arb_price()),
        proptest::option::of(arb_price()),
        proptest::option::of(arb_price()),
        proptest::option::of(arb_price()),
        proptest::option::of(0i64..10_000_000),
    )
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
}

fn arb_patch() -> impl Strategy<Value = BarPatch> {
    arb_bar_fields().prop_map(|(open, high, low, close, volume)| BarPatch {
        symbol: "AAPL".to_string(),
        date: date(),
        open,
        high,
        low,
        close,
        volume,
    })
}

fn arb_stored() -> impl Strategy<Value = DailyBar> {
    arb_bar_fields().prop_map(|(open, high, low, close, volume)| DailyBar {
        symbol: "AAPL".to_string(),
        date: date(),
        open,
        high,
        low,
        close,
        volume,
        updated_at: Utc::now(),
    })
}

fn to_bar(merged: MergedBar) -> DailyBar {
    DailyBar {
        symbol: "AAPL".to_string(),
        date: date(),
        open: merged.open,
        high: merged.high,
        low: merged.low,
        close: merged.close,
        volume: merged.volume,
        updated_at: Utc::now(),
    }
}

/// Any date in the years covered by the built-in holiday set.
fn arb_covered_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..1095)
        .prop_map(|offset| NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(offset))
}

fn arb_local_time() -> impl Strategy<Value = NaiveTime> {
    (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

fn calendar() -> MarketCalendar {
    MarketCalendar::from_config(&CalendarConfig::default()).unwrap()
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A populated field is never cleared by a later, less complete write.
    #[test]
    fn prop_merge_never_clears_fields(stored in arb_stored(), patch in arb_patch()) {
        let merged = MergedBar::merge(Some(&stored), &patch);

        prop_assert!(stored.open.is_none() || merged.open.is_some());
        prop_assert!(stored.high.is_none() || merged.high.is_some());
        prop_assert!(stored.low.is_none() || merged.low.is_some());
        prop_assert!(stored.close.is_none() || merged.close.is_some());
        prop_assert!(stored.volume.is_none() || merged.volume.is_some());
    }

    /// Supplied open, close and volume always win.
    #[test]
    fn prop_supplied_values_overwrite(stored in arb_stored(), patch in arb_patch()) {
        let merged = MergedBar::merge(Some(&stored), &patch);

        if let Some(open) = patch.open {
            prop_assert_eq!(merged.open, Some(open));
        }
        if let Some(close) = patch.close {
            prop_assert_eq!(merged.close, Some(close));
        }
        if let Some(volume) = patch.volume {
            prop_assert_eq!(merged.volume, Some(volume));
        }
    }

    /// low <= open, close <= high holds after every merge.
    #[test]
    fn prop_merge_is_consistent(stored in proptest::option::of(arb_stored()), patch in arb_patch()) {
        let merged = MergedBar::merge(stored.as_ref(), &patch);
        prop_assert!(merged.is_consistent());
    }

    /// Re-applying the same write changes nothing.
    #[test]
    fn prop_merge_is_idempotent(stored in proptest::option::of(arb_stored()), patch in arb_patch()) {
        let once = MergedBar::merge(stored.as_ref(), &patch);
        let twice = MergedBar::merge(Some(&to_bar(once)), &patch);
        prop_assert_eq!(once, twice);
    }

    /// Weekend days are never trading moments.
    #[test]
    fn prop_weekends_never_trade(week in 0i64..156, sunday in any::<bool>(), time in arb_local_time()) {
        let cal = calendar();
        // 2025-01-04 is a Saturday.
        let date = NaiveDate::from_ymd_opt(2025, 1, 4).unwrap()
            + Duration::days(week * 7 + i64::from(sunday));
        prop_assert!(matches!(date.weekday(), Weekday::Sat | Weekday::Sun));

        if let Some(at) = cal.at_local(date, time) {
            prop_assert!(!cal.is_trading_moment(at, SessionWindow::TradingDay));
            prop_assert!(!cal.is_trading_moment(at, SessionWindow::Intraday));
        }
    }

    /// Configured holidays are never trading moments.
    #[test]
    fn prop_holidays_never_trade(
        date in proptest::sample::select(us_exchange_holidays()),
        time in arb_local_time(),
    ) {
        let cal = calendar();
        if let Some(at) = cal.at_local(date, time) {
            prop_assert!(!cal.is_trading_moment(at, SessionWindow::TradingDay));
            prop_assert!(!cal.is_trading_moment(at, SessionWindow::Opening));
            prop_assert!(!cal.is_trading_moment(at, SessionWindow::Closing));
        }
    }

    /// On a trading day the intraday gate is exactly the half-open session.
    #[test]
    fn prop_intraday_gate_matches_session(date in arb_covered_date(), time in arb_local_time()) {
        let cal = calendar();
        prop_assume!(cal.is_trading_day(date));

        if let Some(at) = cal.at_local(date, time) {
            let in_session = time >= cal.session_open() && time < cal.session_close();
            prop_assert_eq!(cal.is_trading_moment(at, SessionWindow::Intraday), in_session);
        }
    }
}
