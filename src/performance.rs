use crate::models::*;
use chrono::{DateTime, Datelike, Utc};
use statrs::statistics::Statistics;

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Aggregates every metric over the resolved part of an order book.
    /// Open trades are only counted, never folded into realized figures.
    pub fn calculate_statistics(book: &OrderBook) -> StrategyStatistics {
        let trades: Vec<&Trade> = book.resolved_trades().collect();
        let profits: Vec<f64> = trades.iter().map(|trade| trade.realized_profit()).collect();
        let total_trades = trades.len();

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut gross_profit = 0.0;
        let mut gross_loss = 0.0;
        let mut gross_profit_pips = 0.0;
        let mut gross_loss_pips = 0.0;
        let mut long_trades = 0usize;
        let mut short_trades = 0usize;
        let mut long_trades_won = 0usize;
        let mut short_trades_won = 0usize;

        for trade in trades.iter().copied() {
            let profit = trade.realized_profit();
            let pips = trade.pips.unwrap_or(0.0);
            let won = profit > 0.0;
            if won {
                winning_trades += 1;
                gross_profit += profit;
                gross_profit_pips += pips;
            } else {
                losing_trades += 1;
                gross_loss += profit;
                gross_loss_pips += pips;
            }
            match trade.direction {
                Direction::Long => {
                    long_trades += 1;
                    if won {
                        long_trades_won += 1;
                    }
                }
                Direction::Short => {
                    short_trades += 1;
                    if won {
                        short_trades_won += 1;
                    }
                }
            }
        }

        let net_profit = book.net_profit();
        let balances = book.balance_curve();
        let max_drawdown_ratio = Self::calculate_max_drawdown_ratio(&balances);
        let intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = trades
            .iter()
            .filter_map(|trade| trade.exit_time.map(|exit| (trade.entry_time, exit)))
            .collect();

        StrategyStatistics {
            symbol: book.symbol.clone(),
            initial_deposit: book.initial_deposit,
            final_balance: book.final_balance(),
            net_profit,
            net_profit_percent: percent_of(net_profit, book.initial_deposit),
            total_trades,
            open_trades: book.open_trades.len(),
            long_trades,
            short_trades,
            long_trades_won,
            short_trades_won,
            winning_trades,
            losing_trades,
            win_rate: ratio(winning_trades as f64, total_trades as f64),
            best_trade: profits.iter().copied().fold(None, |best: Option<f64>, p| {
                Some(best.map_or(p, |b| b.max(p)))
            })
            .unwrap_or(0.0),
            worst_trade: profits.iter().copied().fold(None, |worst: Option<f64>, p| {
                Some(worst.map_or(p, |w| w.min(p)))
            })
            .unwrap_or(0.0),
            gross_profit,
            gross_profit_pips,
            gross_loss,
            gross_loss_pips,
            expected_payoff: ratio(net_profit, total_trades as f64),
            avg_winning_trade: ratio(gross_profit, winning_trades as f64),
            avg_losing_trade: ratio(gross_loss, losing_trades as f64),
            profit_factor: Self::calculate_profit_factor(gross_profit, gross_loss),
            max_consecutive_wins: Self::max_consecutive_wins(&profits),
            max_consecutive_profit: Self::max_consecutive_profit(&profits),
            max_consecutive_losses: Self::max_consecutive_losses(&profits),
            max_consecutive_loss: Self::max_consecutive_loss(&profits),
            trading_activity_percent: Self::trading_activity_percent(&intervals),
            sharpe_ratio: Self::calculate_sharpe_ratio(&Self::return_percents(book)),
            max_drawdown_ratio,
            recovery_factor: Self::calculate_recovery_factor(
                net_profit,
                max_drawdown_ratio,
                book.initial_deposit,
            ),
            drawdowns: Self::calculate_drawdowns(&balances),
            avg_holding_minutes: Self::average_holding_minutes(&intervals),
            trades_per_week: Self::trades_per_week(&intervals),
            returns: Self::calculate_returns(book),
        }
    }

    /// Statistics over trades entered in `year`. The year's book opens at the
    /// balance left by the trades entered before it.
    pub fn calculate_statistics_for_year(book: &OrderBook, year: i32) -> StrategyStatistics {
        let opening_balance = book
            .entries
            .iter()
            .take_while(|entry| entry.trade.entry_time.year() < year)
            .last()
            .map(|entry| entry.balance)
            .unwrap_or(book.initial_deposit);
        let trades: Vec<Trade> = book
            .resolved_trades()
            .chain(book.open_trades.iter())
            .filter(|trade| trade.entry_time.year() == year)
            .cloned()
            .collect();

        let year_book = OrderBook::from_trades(&book.symbol, opening_balance, trades);
        Self::calculate_statistics(&year_book)
    }

    /// Distinct entry years of the book, ascending.
    pub fn entry_years(book: &OrderBook) -> Vec<i32> {
        let mut years: Vec<i32> = book
            .resolved_trades()
            .chain(book.open_trades.iter())
            .map(|trade| trade.entry_time.year())
            .collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    /// Longest run of winning trades, with the profit of that run. On equal
    /// lengths the earlier run is kept.
    pub fn max_consecutive_wins(profits: &[f64]) -> StreakSummary {
        Self::longest_run(profits, |profit| profit > 0.0)
    }

    pub fn max_consecutive_losses(profits: &[f64]) -> StreakSummary {
        Self::longest_run(profits, |profit| profit < 0.0)
    }

    /// Run of consecutive winners whose summed profit is largest.
    pub fn max_consecutive_profit(profits: &[f64]) -> StreakSummary {
        Self::extreme_run(profits, |profit| profit > 0.0, |current, best| current > best)
    }

    /// Run of consecutive losers whose summed loss is largest (most negative).
    pub fn max_consecutive_loss(profits: &[f64]) -> StreakSummary {
        Self::extreme_run(profits, |profit| profit < 0.0, |current, best| current < best)
    }

    fn longest_run(profits: &[f64], in_run: impl Fn(f64) -> bool) -> StreakSummary {
        let mut best = StreakSummary::default();
        let mut current = StreakSummary::default();
        for profit in profits.iter().copied() {
            if in_run(profit) {
                current.trades += 1;
                current.profit += profit;
                if current.trades > best.trades {
                    best = current;
                }
            } else {
                current = StreakSummary::default();
            }
        }
        best
    }

    fn extreme_run(
        profits: &[f64],
        in_run: impl Fn(f64) -> bool,
        better: impl Fn(f64, f64) -> bool,
    ) -> StreakSummary {
        let mut best = StreakSummary::default();
        let mut current = StreakSummary::default();
        for profit in profits.iter().copied() {
            if in_run(profit) {
                current.trades += 1;
                current.profit += profit;
                if better(current.profit, best.profit) {
                    best = current;
                }
            } else {
                current = StreakSummary::default();
            }
        }
        best
    }

    /// Share of the traded span during which at least one position was open.
    /// Overlapping positions are merged so time is never counted twice.
    pub fn trading_activity_percent(intervals: &[(DateTime<Utc>, DateTime<Utc>)]) -> Option<f64> {
        let mut sorted: Vec<(DateTime<Utc>, DateTime<Utc>)> = intervals.to_vec();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by_key(|(start, _)| *start);

        let first_entry = sorted[0].0;
        let last_exit = sorted.iter().map(|(_, end)| *end).max().unwrap_or(first_entry);
        let span_seconds = (last_exit - first_entry).num_seconds();
        if span_seconds <= 0 {
            return Some(100.0);
        }

        let mut active_seconds = 0i64;
        let (mut current_start, mut current_end) = sorted[0];
        for (start, end) in sorted.iter().skip(1).copied() {
            if start <= current_end {
                current_end = current_end.max(end);
            } else {
                active_seconds += (current_end - current_start).num_seconds();
                current_start = start;
                current_end = end;
            }
        }
        active_seconds += (current_end - current_start).num_seconds();

        Some(active_seconds as f64 / span_seconds as f64 * 100.0)
    }

    /// The book's `return_percent` column, in entry order.
    pub fn return_percents(book: &OrderBook) -> Vec<f64> {
        book.entries.iter().map(|entry| entry.return_percent).collect()
    }

    /// Mean over sample standard deviation of per-trade returns, unannualized.
    pub fn calculate_sharpe_ratio(return_percents: &[f64]) -> f64 {
        if return_percents.len() < 2 {
            return 0.0;
        }
        let returns: Vec<f64> = return_percents.iter().map(|value| value / 100.0).collect();
        let mean_return = returns.clone().mean();
        let std_dev = returns.std_dev();
        if !std_dev.is_finite() || std_dev == 0.0 {
            return 0.0;
        }
        mean_return / std_dev
    }

    /// Largest fall from a running peak as a proportion of that peak.
    pub fn calculate_max_drawdown_ratio(balances: &[f64]) -> f64 {
        let mut running_max = f64::NEG_INFINITY;
        let mut max_drawdown = 0.0_f64;
        for balance in balances.iter().copied() {
            running_max = running_max.max(balance);
            if running_max > 0.0 {
                max_drawdown = max_drawdown.max(1.0 - balance / running_max);
            }
        }
        max_drawdown
    }

    pub fn calculate_recovery_factor(
        net_profit: f64,
        max_drawdown_ratio: f64,
        initial: f64,
    ) -> f64 {
        if max_drawdown_ratio == 0.0 {
            return f64::INFINITY;
        }
        let scale = max_drawdown_ratio * initial;
        if scale == 0.0 {
            return 0.0;
        }
        net_profit / scale
    }

    pub fn calculate_profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
        if gross_loss == 0.0 {
            return if gross_profit > 0.0 { f64::INFINITY } else { 0.0 };
        }
        gross_profit / gross_loss.abs()
    }

    /// Balance-based drawdown variants. The first element is the initial
    /// balance.
    pub fn calculate_drawdowns(balances: &[f64]) -> DrawdownInfo {
        let Some(&initial_balance) = balances.first() else {
            return DrawdownInfo::default();
        };

        let min_balance = balances.iter().copied().fold(initial_balance, f64::min);
        let absolute_drawdown = (initial_balance - min_balance).max(0.0);

        let mut peak = initial_balance;
        let mut maximal_drawdown = 0.0;
        let mut maximal_drawdown_percent = 0.0;
        let mut relative_drawdown_equity_percent = 0.0;
        for balance in balances.iter().copied() {
            if balance > peak {
                peak = balance;
            }
            let drawdown = peak - balance;
            let drawdown_percent = if peak > 0.0 { drawdown / peak * 100.0 } else { 0.0 };
            if drawdown > maximal_drawdown {
                maximal_drawdown = drawdown;
                maximal_drawdown_percent = drawdown_percent;
            }
            if drawdown_percent > relative_drawdown_equity_percent {
                relative_drawdown_equity_percent = drawdown_percent;
            }
        }

        DrawdownInfo {
            absolute_drawdown,
            maximal_drawdown,
            maximal_drawdown_percent,
            relative_drawdown_balance_percent: if initial_balance > 0.0 {
                absolute_drawdown / initial_balance * 100.0
            } else {
                0.0
            },
            relative_drawdown_equity_percent,
        }
    }

    /// Month-by-month returns from the first entry month through the last
    /// exit month, compounded into years and an overall figure.
    pub fn calculate_returns(book: &OrderBook) -> ReturnTable {
        let first_entry = book.entries.iter().map(|entry| entry.trade.entry_time).min();
        let last_exit = book
            .entries
            .iter()
            .filter_map(|entry| entry.trade.exit_time)
            .max();
        let (Some(first_entry), Some(last_exit)) = (first_entry, last_exit) else {
            return ReturnTable::default();
        };

        let mut months = Vec::new();
        let mut previous_balance = book.initial_deposit;
        let mut cursor = (first_entry.year(), first_entry.month());
        let end = (last_exit.year(), last_exit.month());
        while cursor <= end {
            let (year, month) = cursor;
            let closing_balance = book
                .entries
                .iter()
                .filter_map(|entry| entry.trade.exit_time.map(|exit| (exit, entry.balance)))
                .filter(|(exit, _)| exit.year() == year && exit.month() == month)
                .max_by_key(|(exit, _)| *exit)
                .map(|(_, balance)| balance);

            let return_percent = match closing_balance {
                Some(balance) => {
                    let value = percent_of(balance - previous_balance, previous_balance);
                    previous_balance = balance;
                    value
                }
                None => 0.0,
            };
            months.push(MonthlyReturn {
                year,
                month,
                return_percent,
            });
            cursor = next_month(year, month);
        }

        let mut years: Vec<YearlyReturn> = Vec::new();
        for monthly in &months {
            if years.last().map(|y| y.year) != Some(monthly.year) {
                years.push(YearlyReturn {
                    year: monthly.year,
                    months: [0.0; 12],
                    return_percent: 0.0,
                });
            }
            if let Some(current) = years.last_mut() {
                current.months[(monthly.month - 1) as usize] = monthly.return_percent;
            }
        }
        for year in years.iter_mut() {
            year.return_percent = compound(year.months.iter().copied());
        }
        let overall_return_percent = compound(years.iter().map(|year| year.return_percent));

        ReturnTable {
            months,
            years,
            overall_return_percent,
        }
    }

    pub fn average_holding_minutes(intervals: &[(DateTime<Utc>, DateTime<Utc>)]) -> f64 {
        if intervals.is_empty() {
            return 0.0;
        }
        let total: i64 = intervals
            .iter()
            .map(|(entry, exit)| (*exit - *entry).num_minutes())
            .sum();
        total as f64 / intervals.len() as f64
    }

    pub fn trades_per_week(intervals: &[(DateTime<Utc>, DateTime<Utc>)]) -> Option<f64> {
        let first_entry = intervals.iter().map(|(entry, _)| *entry).min()?;
        let last_exit = intervals.iter().map(|(_, exit)| *exit).max()?;
        let weeks = (last_exit - first_entry).num_seconds() as f64 / (7.0 * 24.0 * 60.0 * 60.0);
        if weeks <= 0.0 {
            return None;
        }
        Some(intervals.len() as f64 / weeks)
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

fn percent_of(value: f64, base: f64) -> f64 {
    ratio(value, base) * 100.0
}

fn compound(returns_percent: impl Iterator<Item = f64>) -> f64 {
    (returns_percent.fold(1.0, |acc, value| acc * (1.0 + value / 100.0)) - 1.0) * 100.0
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
    }

    fn closed_trade(
        id: u64,
        direction: Direction,
        entry: DateTime<Utc>,
        exit: DateTime<Utc>,
        profit: f64,
    ) -> Trade {
        Trade {
            id,
            direction,
            lot_size: 0.1,
            symbol: "EURUSD".to_string(),
            entry_time: entry,
            entry_price: 1.1,
            stop_loss: 1.098,
            take_profit: 1.104,
            exit_time: Some(exit),
            exit_price: Some(1.1),
            exit_reason: Some(ExitReason::TakeProfit),
            commission: 0.0,
            swap: Some(0.0),
            profit: Some(profit),
            pips: Some(profit),
            open_positions_at_entry: 1,
            status: TradeStatus::Closed,
        }
    }

    fn book_from_profits(profits: &[f64]) -> OrderBook {
        let trades = profits
            .iter()
            .enumerate()
            .map(|(i, profit)| {
                let entry = at(2024, 1, 1, 0) + Duration::hours(2 * i as i64);
                let exit = entry + Duration::hours(1);
                closed_trade(i as u64 + 1, Direction::Long, entry, exit, *profit)
            })
            .collect();
        OrderBook::from_trades("EURUSD", 10_000.0, trades)
    }

    #[test]
    fn streaks_follow_reference_sequence() {
        let profits = [10.0, 20.0, -5.0, 15.0, 25.0];
        let wins = PerformanceCalculator::max_consecutive_wins(&profits);
        assert_eq!(wins.trades, 2);
        assert!((wins.profit - 30.0).abs() < 1e-9);

        let best = PerformanceCalculator::max_consecutive_profit(&profits);
        assert_eq!(best.trades, 2);
        assert!((best.profit - 40.0).abs() < 1e-9);

        let losses = PerformanceCalculator::max_consecutive_losses(&profits);
        assert_eq!(losses.trades, 1);
        assert!((losses.profit + 5.0).abs() < 1e-9);

        let worst = PerformanceCalculator::max_consecutive_loss(&profits);
        assert_eq!(worst.trades, 1);
        assert!((worst.profit + 5.0).abs() < 1e-9);
    }

    #[test]
    fn loss_streaks_ignore_breakeven_trades() {
        let profits = [-3.0, -4.0, 0.0, -10.0, 5.0];
        let losses = PerformanceCalculator::max_consecutive_losses(&profits);
        assert_eq!(losses.trades, 2);
        assert!((losses.profit + 7.0).abs() < 1e-9);
        let worst = PerformanceCalculator::max_consecutive_loss(&profits);
        assert_eq!(worst.trades, 1);
        assert!((worst.profit + 10.0).abs() < 1e-9);
        // breakeven also breaks a winning run
        let wins = PerformanceCalculator::max_consecutive_wins(&[1.0, 0.0, 1.0]);
        assert_eq!(wins.trades, 1);
    }

    #[test]
    fn activity_merges_overlapping_trades() {
        let a = (at(2024, 1, 1, 0), at(2024, 1, 1, 4));
        let b = (at(2024, 1, 1, 2), at(2024, 1, 1, 6));
        let c = (at(2024, 1, 1, 8), at(2024, 1, 1, 10));
        let activity = PerformanceCalculator::trading_activity_percent(&[c, a, b]).unwrap();
        // 6 + 2 active hours over a 10 hour span
        assert!((activity - 80.0).abs() < 1e-9);
    }

    #[test]
    fn activity_of_duplicate_trades_matches_single_trade() {
        let a = (at(2024, 1, 1, 0), at(2024, 1, 1, 4));
        let c = (at(2024, 1, 1, 8), at(2024, 1, 1, 10));
        let single = PerformanceCalculator::trading_activity_percent(&[a, c]).unwrap();
        let doubled = PerformanceCalculator::trading_activity_percent(&[a, a, c]).unwrap();
        assert!((single - doubled).abs() < 1e-12);
        assert!(PerformanceCalculator::trading_activity_percent(&[]).is_none());
    }

    #[test]
    fn sharpe_uses_sample_deviation() {
        let returns = [1.0, 2.0, 3.0];
        // mean 0.02, sample std 0.01
        let sharpe = PerformanceCalculator::calculate_sharpe_ratio(&returns);
        assert!((sharpe - 2.0).abs() < 1e-9);
        assert_eq!(PerformanceCalculator::calculate_sharpe_ratio(&[1.0, 1.0]), 0.0);
        assert_eq!(PerformanceCalculator::calculate_sharpe_ratio(&[5.0]), 0.0);
    }

    #[test]
    fn drawdowns_are_zero_for_monotone_balance() {
        let balances = [10_000.0, 10_000.0, 10_050.0, 10_200.0];
        let info = PerformanceCalculator::calculate_drawdowns(&balances);
        assert_eq!(info, DrawdownInfo::default());
        assert_eq!(PerformanceCalculator::calculate_max_drawdown_ratio(&balances), 0.0);
        let recovery = PerformanceCalculator::calculate_recovery_factor(200.0, 0.0, 10_000.0);
        assert!(recovery.is_infinite());
    }

    #[test]
    fn drawdown_variants_on_peak_and_trough() {
        let balances = [1_000.0, 1_200.0, 900.0, 1_100.0, 950.0];
        let info = PerformanceCalculator::calculate_drawdowns(&balances);
        assert!((info.absolute_drawdown - 100.0).abs() < 1e-9);
        assert!((info.maximal_drawdown - 300.0).abs() < 1e-9);
        assert!((info.maximal_drawdown_percent - 25.0).abs() < 1e-9);
        assert!((info.relative_drawdown_balance_percent - 10.0).abs() < 1e-9);
        assert!((info.relative_drawdown_equity_percent - 25.0).abs() < 1e-9);

        let ratio = PerformanceCalculator::calculate_max_drawdown_ratio(&balances);
        assert!((ratio - 0.25).abs() < 1e-9);
        let recovery = PerformanceCalculator::calculate_recovery_factor(-50.0, ratio, 1_000.0);
        assert!((recovery + 0.2).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_edge_cases() {
        assert!(PerformanceCalculator::calculate_profit_factor(10.0, 0.0).is_infinite());
        assert_eq!(PerformanceCalculator::calculate_profit_factor(0.0, 0.0), 0.0);
        assert!((PerformanceCalculator::calculate_profit_factor(30.0, -10.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn statistics_over_reference_book() {
        let book = book_from_profits(&[10.0, 20.0, -5.0, 15.0, 25.0]);
        let stats = PerformanceCalculator::calculate_statistics(&book);
        assert_eq!(stats.total_trades, 5);
        assert_eq!(stats.winning_trades, 4);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.long_trades_won, 4);
        assert!((stats.net_profit - 65.0).abs() < 1e-9);
        assert!((stats.final_balance - 10_065.0).abs() < 1e-9);
        assert!((stats.gross_profit - 70.0).abs() < 1e-9);
        assert!((stats.gross_loss + 5.0).abs() < 1e-9);
        assert!((stats.profit_factor - 14.0).abs() < 1e-9);
        assert!((stats.best_trade - 25.0).abs() < 1e-9);
        assert!((stats.worst_trade + 5.0).abs() < 1e-9);
        assert!((stats.expected_payoff - 13.0).abs() < 1e-9);
        assert!((stats.avg_holding_minutes - 60.0).abs() < 1e-9);
        assert_eq!(stats.max_consecutive_profit.trades, 2);
        assert!(stats.sharpe_ratio > 0.0);
        // 5 hours active over a 9 hour span
        assert!((stats.trading_activity_percent.unwrap() - 500.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn statistics_for_empty_book_use_sentinels() {
        let book = OrderBook::from_trades("EURUSD", 10_000.0, Vec::new());
        let stats = PerformanceCalculator::calculate_statistics(&book);
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.win_rate, 0.0);
        assert_eq!(stats.sharpe_ratio, 0.0);
        assert_eq!(stats.profit_factor, 0.0);
        assert!(stats.trading_activity_percent.is_none());
        assert!(stats.trades_per_week.is_none());
        assert!(stats.returns.months.is_empty());
    }

    #[test]
    fn monthly_returns_compound_into_years() {
        let trades = vec![
            closed_trade(1, Direction::Long, at(2023, 11, 10, 0), at(2023, 11, 12, 0), 1_000.0),
            closed_trade(2, Direction::Short, at(2023, 12, 30, 0), at(2024, 2, 2, 0), -550.0),
        ];
        let book = OrderBook::from_trades("EURUSD", 10_000.0, trades);
        let table = PerformanceCalculator::calculate_returns(&book);

        let labels: Vec<(i32, u32)> = table.months.iter().map(|m| (m.year, m.month)).collect();
        assert_eq!(labels, vec![(2023, 11), (2023, 12), (2024, 1), (2024, 2)]);
        assert!((table.months[0].return_percent - 10.0).abs() < 1e-9);
        assert_eq!(table.months[1].return_percent, 0.0);
        assert_eq!(table.months[2].return_percent, 0.0);
        assert!((table.months[3].return_percent + 5.0).abs() < 1e-9);

        assert_eq!(table.years.len(), 2);
        assert!((table.years[0].return_percent - 10.0).abs() < 1e-9);
        assert!((table.years[1].return_percent + 5.0).abs() < 1e-9);
        // 1.10 * 0.95
        assert!((table.overall_return_percent - 4.5).abs() < 1e-9);
        assert!((book.final_balance() - 10_450.0).abs() < 1e-9);
    }

    #[test]
    fn sharpe_reads_the_return_column_of_the_book() {
        let book = book_from_profits(&[40.0, -20.0, 40.0]);
        let column = PerformanceCalculator::return_percents(&book);
        assert_eq!(column.len(), 3);
        for (value, expected) in column.iter().zip([0.4, 0.2, 0.6]) {
            assert!((value - expected).abs() < 1e-9);
        }

        // mean 0.4, sample deviation 0.2
        let stats = PerformanceCalculator::calculate_statistics(&book);
        assert!((stats.sharpe_ratio - 2.0).abs() < 1e-9);
    }

    #[test]
    fn holding_time_and_weekly_frequency() {
        let start = at(2024, 1, 1, 0);
        let intervals = vec![
            (start, start + Duration::hours(1)),
            (start + Duration::hours(167), start + Duration::hours(168)),
        ];
        assert!((PerformanceCalculator::average_holding_minutes(&intervals) - 60.0).abs() < 1e-9);
        let per_week = PerformanceCalculator::trades_per_week(&intervals).unwrap();
        assert!((per_week - 2.0).abs() < 1e-9);

        assert_eq!(PerformanceCalculator::average_holding_minutes(&[]), 0.0);
        assert_eq!(PerformanceCalculator::trades_per_week(&[]), None);
    }

    #[test]
    fn statistics_for_one_entry_year() {
        let trades = vec![
            closed_trade(1, Direction::Long, at(2023, 6, 1, 0), at(2023, 6, 2, 0), 100.0),
            closed_trade(2, Direction::Short, at(2023, 12, 31, 20), at(2024, 1, 2, 0), -50.0),
            closed_trade(3, Direction::Long, at(2024, 3, 1, 0), at(2024, 3, 1, 5), 200.0),
        ];
        let book = OrderBook::from_trades("EURUSD", 10_000.0, trades);
        assert_eq!(PerformanceCalculator::entry_years(&book), vec![2023, 2024]);

        let first = PerformanceCalculator::calculate_statistics_for_year(&book, 2023);
        assert_eq!(first.total_trades, 2);
        assert!((first.initial_deposit - 10_000.0).abs() < 1e-9);
        assert!((first.net_profit - 50.0).abs() < 1e-9);

        let second = PerformanceCalculator::calculate_statistics_for_year(&book, 2024);
        assert_eq!(second.total_trades, 1);
        assert_eq!(second.long_trades, 1);
        assert!((second.initial_deposit - 10_050.0).abs() < 1e-9);
        assert!((second.final_balance - 10_250.0).abs() < 1e-9);
        assert!((second.net_profit_percent - 200.0 / 10_050.0 * 100.0).abs() < 1e-9);

        let empty = PerformanceCalculator::calculate_statistics_for_year(&book, 2025);
        assert_eq!(empty.total_trades, 0);
        assert!((empty.initial_deposit - 10_250.0).abs() < 1e-9);
    }
}
