use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use signal_backtester::config::LotBounds;
use signal_backtester::performance::PerformanceCalculator;
use signal_backtester::trading_rules::{calculate_lot_size, calculate_swap, LotSizingParams};

fn minute(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(offset)
}

fn span(start: i64, length: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    (minute(start), minute(start + length))
}

fn intervals(spans: &[(i64, i64)]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    spans.iter().map(|(start, length)| span(*start, *length)).collect()
}

#[test]
fn nested_trade_matches_outer_trade() {
    let outer = vec![span(0, 4)];
    let nested = vec![span(0, 4), span(1, 2)];
    assert_eq!(
        PerformanceCalculator::trading_activity_percent(&outer),
        PerformanceCalculator::trading_activity_percent(&nested)
    );
    let spread = vec![span(0, 4), span(1, 2), span(10, 2)];
    let merged = PerformanceCalculator::trading_activity_percent(&spread).unwrap();
    // 6 active minutes over a 12 minute span
    assert!((merged - 50.0).abs() < 1e-9);
}

proptest! {
    #[test]
    fn lot_size_stays_within_bounds(
        dynamic in any::<bool>(),
        equity in -1.0e6f64..1.0e7,
        risk_percent in 0.0f64..100.0,
        stop_distance_pips in -50.0f64..500.0,
        fixed_lot in 0.0f64..50.0,
        min_lot in 0.01f64..1.0,
        extra in 0.0f64..20.0,
    ) {
        let bounds = LotBounds { min_lot, max_lot: min_lot + extra };
        let lot = calculate_lot_size(LotSizingParams {
            dynamic,
            equity,
            risk_percent,
            stop_distance_pips,
            fixed_lot,
            bounds,
        });
        prop_assert!(lot.is_finite());
        prop_assert!(lot >= bounds.min_lot && lot <= bounds.max_lot);
    }

    #[test]
    fn non_decreasing_balances_have_no_drawdown(
        start in 1.0f64..1.0e6,
        steps in prop::collection::vec(0.0f64..500.0, 0..50),
    ) {
        let mut balances = vec![start];
        for step in steps {
            let last = *balances.last().unwrap();
            balances.push(last + step);
        }
        prop_assert_eq!(PerformanceCalculator::calculate_max_drawdown_ratio(&balances), 0.0);
        let drawdowns = PerformanceCalculator::calculate_drawdowns(&balances);
        prop_assert_eq!(drawdowns.maximal_drawdown, 0.0);
        prop_assert_eq!(drawdowns.absolute_drawdown, 0.0);
    }

    #[test]
    fn duplicated_intervals_do_not_change_activity(
        spans in prop::collection::vec((0i64..10_000, 1i64..600), 1..20),
    ) {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let intervals: Vec<_> = spans
            .iter()
            .map(|(offset, length)| {
                let entry = origin + Duration::minutes(*offset);
                (entry, entry + Duration::minutes(*length))
            })
            .collect();
        let mut doubled = intervals.clone();
        doubled.extend(intervals.iter().copied());

        let single = PerformanceCalculator::trading_activity_percent(&intervals).unwrap();
        let twice = PerformanceCalculator::trading_activity_percent(&doubled).unwrap();
        prop_assert!((single - twice).abs() < 1e-9);
        prop_assert!(single > 0.0 && single <= 100.0 + 1e-9);
    }

    #[test]
    fn nested_trade_does_not_change_activity(
        background in prop::collection::vec((0i64..10_000, 1i64..600), 0..10),
        outer_start in 0i64..10_000,
        outer_length in 2i64..600,
        inner_from in 0i64..100,
        inner_to in 0i64..100,
    ) {
        let (low, high) = (inner_from.min(inner_to), inner_from.max(inner_to));
        let outer = span(outer_start, outer_length);
        let inner_start = outer_start + outer_length * low / 100;
        let inner_end = (outer_start + outer_length * high / 100).max(inner_start + 1);
        let inner = (minute(inner_start), minute(inner_end.min(outer_start + outer_length)));

        let mut alone = intervals(&background);
        alone.push(outer);
        let mut with_inner = alone.clone();
        with_inner.push(inner);

        let expected = PerformanceCalculator::trading_activity_percent(&alone).unwrap();
        let actual = PerformanceCalculator::trading_activity_percent(&with_inner).unwrap();
        prop_assert!((expected - actual).abs() < 1e-9);
    }

    #[test]
    fn overlapping_pair_counts_like_its_union(
        background in prop::collection::vec((0i64..10_000, 1i64..600), 0..10),
        first_start in 0i64..10_000,
        first_length in 1i64..600,
        second_offset in 0i64..600,
        second_length in 1i64..600,
    ) {
        let second_start = first_start + second_offset.min(first_length);
        let first_end = first_start + first_length;
        let second_end = second_start + second_length;

        let mut pair = intervals(&background);
        let mut union = pair.clone();
        pair.push((minute(first_start), minute(first_end)));
        pair.push((minute(second_start), minute(second_end)));
        union.push((minute(first_start), minute(first_end.max(second_end))));

        let expected = PerformanceCalculator::trading_activity_percent(&union).unwrap();
        let actual = PerformanceCalculator::trading_activity_percent(&pair).unwrap();
        prop_assert!((expected - actual).abs() < 1e-9);
    }

    #[test]
    fn no_swap_without_holding_time(
        minutes in 0i64..1_000_000,
        rate in -50.0f64..50.0,
        lot in 0.01f64..10.0,
        triple in any::<bool>(),
    ) {
        let time = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes);
        prop_assert_eq!(calculate_swap(time, time, rate, lot, triple), 0.0);
    }
}
