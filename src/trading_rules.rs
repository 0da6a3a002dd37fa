use crate::config::LotBounds;
use crate::models::Direction;
use chrono::{DateTime, Datelike, Utc, Weekday};

/// Rounds to cents (and to lot granularity, which is also 0.01).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct LotSizingParams {
    pub dynamic: bool,
    pub equity: f64,
    pub risk_percent: f64,
    pub stop_distance_pips: f64,
    pub fixed_lot: f64,
    pub bounds: LotBounds,
}

/// Converts equity and risk into a bounded lot size. Degenerate inputs fall
/// back to the fixed lot, and non-finite results to the minimum lot.
pub fn calculate_lot_size(params: LotSizingParams) -> f64 {
    let LotSizingParams {
        dynamic,
        equity,
        risk_percent,
        stop_distance_pips,
        fixed_lot,
        bounds,
    } = params;
    let LotBounds { min_lot, max_lot } = bounds;

    let raw = if dynamic && stop_distance_pips > 0.0 {
        let risk_amount = equity * risk_percent / 100.0;
        risk_amount / stop_distance_pips
    } else {
        fixed_lot
    };

    if !raw.is_finite() {
        return min_lot;
    }

    round2(raw.clamp(min_lot, max_lot)).clamp(min_lot, max_lot)
}

/// Overnight financing for a position held from `entry_time` to `exit_time`.
///
/// Every calendar date from the entry date up to (excluding) the exit date
/// rolls over one night. The night following a Wednesday is charged three
/// times when `triple_wednesday` is set, covering the weekend settlement.
pub fn calculate_swap(
    entry_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
    rate_per_lot_per_night: f64,
    lot_size: f64,
    triple_wednesday: bool,
) -> f64 {
    if entry_time >= exit_time || !rate_per_lot_per_night.is_finite() || !lot_size.is_finite() {
        return 0.0;
    }

    let (ordinary, tripled) = count_swap_nights(entry_time, exit_time, triple_wednesday);
    if ordinary == 0 && tripled == 0 {
        return 0.0;
    }

    let nights = ordinary as f64 + 3.0 * tripled as f64;
    round2(rate_per_lot_per_night * lot_size * nights)
}

/// Returns `(ordinary_nights, tripled_nights)` between two instants.
pub fn count_swap_nights(
    entry_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
    triple_wednesday: bool,
) -> (u32, u32) {
    let mut ordinary = 0;
    let mut tripled = 0;
    if entry_time >= exit_time {
        return (ordinary, tripled);
    }

    let exit_date = exit_time.date_naive();
    let mut day = entry_time.date_naive();
    while day < exit_date {
        if triple_wednesday && day.weekday() == Weekday::Wed {
            tripled += 1;
        } else {
            ordinary += 1;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    (ordinary, tripled)
}

/// Price at which the stop fills: the entry shifted against the position.
pub fn stop_loss_price(
    direction: Direction,
    entry_price: f64,
    stop_pips: f64,
    pip_size: f64,
) -> f64 {
    entry_price - direction.sign() * stop_pips * pip_size
}

pub fn take_profit_price(
    direction: Direction,
    entry_price: f64,
    target_pips: f64,
    pip_size: f64,
) -> f64 {
    entry_price + direction.sign() * target_pips * pip_size
}

/// Longs pay the offer on entry; shorts pay it when buying back.
pub fn entry_price(direction: Direction, reference_price: f64, spread_price: f64) -> f64 {
    match direction {
        Direction::Long => reference_price + spread_price,
        Direction::Short => reference_price,
    }
}

pub fn market_exit_price(direction: Direction, next_open: f64, spread_price: f64) -> f64 {
    match direction {
        Direction::Long => next_open,
        Direction::Short => next_open + spread_price,
    }
}

pub fn pips_between(direction: Direction, entry_price: f64, exit_price: f64, pip_size: f64) -> f64 {
    direction.sign() * (exit_price - entry_price) / pip_size
}

/// Monetary result of a trade given its pip result and lot size.
pub fn settle_profit(pips: f64, lot_size: f64, lot_unit: f64, swap: f64) -> f64 {
    round2(pips * lot_size / lot_unit + swap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
    }

    fn params(dynamic: bool, equity: f64, risk: f64, stop: f64, fixed: f64) -> LotSizingParams {
        LotSizingParams {
            dynamic,
            equity,
            risk_percent: risk,
            stop_distance_pips: stop,
            fixed_lot: fixed,
            bounds: LotBounds::default(),
        }
    }

    #[test]
    fn test_dynamic_lot_from_equity_and_stop() {
        // 10_000 * 1% = 100 at risk over 50 pips
        let lot = calculate_lot_size(params(true, 10_000.0, 1.0, 50.0, 0.1));
        assert!((lot - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_dynamic_lot_is_clamped_and_rounded() {
        assert!((calculate_lot_size(params(true, 1_000_000.0, 5.0, 10.0, 0.1)) - 5.0).abs() < 1e-9);
        assert!((calculate_lot_size(params(true, 100.0, 1.0, 500.0, 0.1)) - 0.01).abs() < 1e-9);
        let lot = calculate_lot_size(params(true, 10_000.0, 1.0, 30.0, 0.1));
        assert!((lot - 3.33).abs() < 1e-9);
    }

    #[test]
    fn test_lot_falls_back_to_fixed_without_stop() {
        assert!((calculate_lot_size(params(true, 10_000.0, 1.0, 0.0, 0.25)) - 0.25).abs() < 1e-9);
        assert!((calculate_lot_size(params(true, 10_000.0, 1.0, -4.0, 0.25)) - 0.25).abs() < 1e-9);
        assert!((calculate_lot_size(params(false, 10_000.0, 1.0, 20.0, 0.1)) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_lot_handles_non_finite_inputs() {
        assert!((calculate_lot_size(params(true, f64::NAN, 1.0, 20.0, 0.1)) - 0.01).abs() < 1e-9);
        let lot = calculate_lot_size(params(false, 0.0, 0.0, 0.0, f64::INFINITY));
        assert!((lot - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_swap_zero_for_intraday_and_equal_times() {
        let entry = at(2024, 1, 3, 10, 0);
        assert_eq!(calculate_swap(entry, entry, 2.0, 1.0, true), 0.0);
        assert_eq!(calculate_swap(entry, at(2024, 1, 3, 22, 0), 2.0, 1.0, true), 0.0);
        assert_eq!(calculate_swap(at(2024, 1, 4, 0, 0), entry, 2.0, 1.0, true), 0.0);
    }

    #[test]
    fn test_swap_single_ordinary_night() {
        // Monday into Tuesday
        let swap = calculate_swap(at(2024, 1, 1, 12, 0), at(2024, 1, 2, 9, 0), -1.5, 0.5, true);
        assert!((swap - (-0.75)).abs() < 1e-9);
    }

    #[test]
    fn test_swap_wednesday_night_is_tripled() {
        let rate = 2.0;
        let lot = 1.0;
        // 2024-01-03 is a Wednesday
        let wednesday =
            calculate_swap(at(2024, 1, 3, 12, 0), at(2024, 1, 4, 1, 0), rate, lot, true);
        let tuesday = calculate_swap(at(2024, 1, 2, 12, 0), at(2024, 1, 3, 1, 0), rate, lot, true);
        assert!((wednesday - 3.0 * tuesday).abs() < 1e-9);
        assert!((wednesday - 6.0).abs() < 1e-9);

        let flat = calculate_swap(at(2024, 1, 3, 12, 0), at(2024, 1, 4, 1, 0), rate, lot, false);
        assert!((flat - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_swap_week_long_hold_counts_nights() {
        // Mon 1st -> Mon 8th: seven nights, one of them Wednesday
        let (ordinary, tripled) =
            count_swap_nights(at(2024, 1, 1, 8, 0), at(2024, 1, 8, 8, 0), true);
        assert_eq!((ordinary, tripled), (6, 1));
        let swap = calculate_swap(at(2024, 1, 1, 8, 0), at(2024, 1, 8, 8, 0), 1.0, 0.1, true);
        assert!((swap - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_swap_ignores_malformed_rate() {
        assert_eq!(
            calculate_swap(at(2024, 1, 1, 8, 0), at(2024, 1, 5, 8, 0), f64::NAN, 1.0, true),
            0.0
        );
    }

    #[test]
    fn test_price_helpers_mirror_direction() {
        let pip = 0.0001;
        assert!((stop_loss_price(Direction::Long, 1.1, 20.0, pip) - 1.098).abs() < 1e-12);
        assert!((stop_loss_price(Direction::Short, 1.1, 20.0, pip) - 1.102).abs() < 1e-12);
        assert!((take_profit_price(Direction::Long, 1.1, 40.0, pip) - 1.104).abs() < 1e-12);
        assert!((take_profit_price(Direction::Short, 1.1, 40.0, pip) - 1.096).abs() < 1e-12);
        assert!((entry_price(Direction::Long, 1.1, 0.0001) - 1.1001).abs() < 1e-12);
        assert!((entry_price(Direction::Short, 1.1, 0.0001) - 1.1).abs() < 1e-12);
        assert!((market_exit_price(Direction::Short, 1.1, 0.0001) - 1.1001).abs() < 1e-12);
        assert!((pips_between(Direction::Short, 1.1, 1.099, pip) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_settle_profit_uses_lot_unit() {
        assert!((settle_profit(40.0, 0.10, 0.10, 0.0) - 40.0).abs() < 1e-9);
        assert!((settle_profit(-20.0, 0.5, 0.10, -1.234) - (-101.23)).abs() < 1e-9);
    }
}
