//! Rolling statistics over stored daily bars.

use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::model::{DailyBar, RollingStats};

/// Number of most recent bars the averages cover (one trading year).
pub const ROLLING_WINDOW: usize = 252;

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn mean(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let (sum, count) = values.fold((Decimal::ZERO, 0u32), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / Decimal::from(count))
}

/// Recompute the rolling statistics of one symbol.
///
/// `bars` may come in any order; `as_of` picks the calendar year used for the
/// year-start price.
pub fn compute_rolling_stats(bars: &[DailyBar], as_of: NaiveDate) -> RollingStats {
    let mut ordered: Vec<&DailyBar> = bars.iter().filter(|b| b.date <= as_of).collect();
    ordered.sort_by_key(|b| b.date);

    let window = &ordered[ordered.len().saturating_sub(ROLLING_WINDOW)..];

    let avg_daily_volume = mean(window.iter().filter_map(|b| b.volume).map(Decimal::from))
        .and_then(|v| {
            v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        });

    RollingStats {
        avg_daily_volume,
        avg_daily_low: mean(window.iter().filter_map(|b| b.low)).map(round2),
        avg_daily_high: mean(window.iter().filter_map(|b| b.high)).map(round2),
        year_start_price: ordered
            .iter()
            .filter(|b| b.date.year() == as_of.year())
            .find_map(|b| b.close),
        previous_day_open: ordered.iter().rev().find_map(|b| b.open),
        previous_day_close: ordered.iter().rev().find_map(|b| b.close),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn bar(
        date: NaiveDate,
        open: Option<Decimal>,
        close: Option<Decimal>,
        volume: Option<i64>,
    ) -> DailyBar {
        DailyBar {
            symbol: "AAPL".to_string(),
            date,
            open,
            high: close.map(|c| c + dec!(1)),
            low: close.map(|c| c - dec!(1)),
            close,
            volume,
            updated_at: Utc::now(),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(
            compute_rolling_stats(&[], d(2025, 3, 5)),
            RollingStats::default()
        );
    }

    #[test]
    fn test_averages_are_rounded() {
        let bars = vec![
            bar(d(2025, 3, 3), Some(dec!(10)), Some(dec!(10.00)), Some(100)),
            bar(d(2025, 3, 4), Some(dec!(10)), Some(dec!(10.01)), Some(101)),
            bar(d(2025, 3, 5), Some(dec!(10)), Some(dec!(10.01)), Some(101)),
        ];
        let stats = compute_rolling_stats(&bars, d(2025, 3, 5));

        // (100 + 101 + 101) / 3 = 100.67
        assert_eq!(stats.avg_daily_volume, Some(101));
        // highs: 11.00, 11.01, 11.01 -> 11.0066..
        assert_eq!(stats.avg_daily_high, Some(dec!(11.01)));
        assert_eq!(stats.avg_daily_low, Some(dec!(9.01)));
    }

    #[test]
    fn test_year_start_price_uses_as_of_year() {
        let bars = vec![
            bar(d(2024, 12, 31), None, Some(dec!(90)), None),
            bar(d(2025, 1, 2), None, Some(dec!(95)), None),
            bar(d(2025, 1, 3), None, Some(dec!(96)), None),
        ];
        let stats = compute_rolling_stats(&bars, d(2025, 1, 3));
        assert_eq!(stats.year_start_price, Some(dec!(95)));

        let stats = compute_rolling_stats(&bars, d(2024, 12, 31));
        assert_eq!(stats.year_start_price, Some(dec!(90)));
    }

    #[test]
    fn test_previous_day_fields_skip_partial_rows() {
        let bars = vec![
            bar(d(2025, 3, 4), Some(dec!(100)), Some(dec!(101)), Some(10)),
            bar(d(2025, 3, 5), Some(dec!(102)), None, None),
        ];
        let stats = compute_rolling_stats(&bars, d(2025, 3, 5));

        assert_eq!(stats.previous_day_open, Some(dec!(102)));
        assert_eq!(stats.previous_day_close, Some(dec!(101)));
    }

    #[test]
    fn test_window_is_bounded() {
        let start = d(2024, 1, 1);
        let mut bars: Vec<DailyBar> = (0..300)
            .map(|i| bar(start + Duration::days(i), None, Some(dec!(10)), Some(1)))
            .collect();
        // Ancient outlier outside the window must not count.
        bars[0].volume = Some(1_000_000);

        let stats = compute_rolling_stats(&bars, start + Duration::days(299));
        assert_eq!(stats.avg_daily_volume, Some(1));
    }

    #[test]
    fn test_future_bars_are_ignored() {
        let bars = vec![
            bar(d(2025, 3, 4), Some(dec!(100)), Some(dec!(101)), Some(10)),
            bar(d(2025, 3, 6), Some(dec!(200)), Some(dec!(201)), Some(10)),
        ];
        let stats = compute_rolling_stats(&bars, d(2025, 3, 5));
        assert_eq!(stats.previous_day_close, Some(dec!(101)));
    }
}
