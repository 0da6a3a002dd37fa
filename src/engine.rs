use crate::config::{ConcurrencyRule, Settings, SimulationSettings, StrategyConfig};
use crate::error::SimulationError;
use crate::models::*;
use crate::trading_rules::{
    calculate_lot_size, calculate_swap, entry_price, market_exit_price, pips_between,
    settle_profit, stop_loss_price, take_profit_price, LotSizingParams,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use uuid::Uuid;

/// Time span during which a committed trade occupies a position slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionInterval {
    pub entry_time: DateTime<Utc>,
    /// Exit time, or the end of the scan window for unresolved trades.
    pub exit_time: DateTime<Utc>,
    pub direction: Direction,
    pub profit: Option<f64>,
}

/// Running account state of one simulation run. Owned by a single run and
/// threaded through every resolution step.
#[derive(Debug, Clone)]
pub struct EquityState {
    pub current_equity: f64,
    pub open_positions: Vec<PositionInterval>,
    heuristic_counter: usize,
    previous_exit: Option<DateTime<Utc>>,
}

impl EquityState {
    pub fn new(initial_deposit: f64) -> Self {
        Self {
            current_equity: initial_deposit,
            open_positions: Vec::new(),
            heuristic_counter: 1,
            previous_exit: None,
        }
    }

    /// Positions still holding a slot at `time`.
    pub fn open_count_at(&self, time: DateTime<Utc>) -> usize {
        self.open_positions
            .iter()
            .filter(|interval| interval.entry_time <= time && interval.exit_time > time)
            .count()
    }

    /// Exit of the most recently committed trade, or the end of its scan
    /// window when it never resolved. May lie after the current bar.
    pub fn previous_exit(&self) -> Option<DateTime<Utc>> {
        self.previous_exit
    }

    fn commit(&mut self, interval: PositionInterval) {
        if let Some(profit) = interval.profit {
            self.current_equity += profit;
        }
        self.previous_exit = Some(interval.exit_time);
        self.open_positions.push(interval);
    }
}

#[derive(Debug, PartialEq)]
enum AdmissionOutcome {
    Admitted { open_positions: usize },
    Rejected(SkipReason),
}

struct ExitResolution {
    exit_time: DateTime<Utc>,
    exit_price: f64,
    reason: ExitReason,
    pips: f64,
}

enum ScanOutcome {
    Exited(ExitResolution),
    /// No exit inside the window; the slot stays occupied until `window_end`.
    Unresolved { window_end: DateTime<Utc> },
}

pub struct Engine {
    pub strategy_id: String,
    pub config: StrategyConfig,
    settings: SimulationSettings,
}

impl Engine {
    pub fn new(
        strategy_id: &str,
        config: StrategyConfig,
        settings: SimulationSettings,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        settings.validate()?;
        Ok(Self {
            strategy_id: strategy_id.to_string(),
            config,
            settings,
        })
    }

    // Construct an Engine from one flat settings map carrying both the
    // strategy keys and the run-level keys.
    pub fn from_settings_map(
        strategy_id: &str,
        settings: &Settings,
    ) -> Result<Self, SimulationError> {
        let config = StrategyConfig::from_settings_map(settings)?;
        let run_settings = SimulationSettings::from_settings_map(settings)?;
        Self::new(strategy_id, config, run_settings)
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Replays every signal bar in time order and resolves the resulting
    /// trades against the bars that follow.
    pub fn simulate(
        &self,
        profile: &SymbolProfile,
        bars: &[MarketBar],
    ) -> Result<SimulationRun, SimulationError> {
        validate_profile(profile)?;
        validate_bar_order(bars)?;

        info!(
            "Simulating {} on {} ({} bars, concurrency rule: {})",
            self.strategy_id,
            profile.symbol,
            bars.len(),
            self.settings.concurrency_rule.label()
        );

        let mut state = EquityState::new(self.settings.initial_deposit);
        let mut trades: Vec<Trade> = Vec::new();
        let mut skipped: Vec<SignalSkip> = Vec::new();

        for (index, bar) in bars.iter().enumerate() {
            if bar.signal == 0 {
                continue;
            }
            let trade_id = trades.len() as u64 + 1;
            match self.resolve_candidate(profile, bars, index, trade_id, &mut state) {
                Ok(trade) => trades.push(trade),
                Err(reason) => skipped.push(SignalSkip {
                    time: bar.time,
                    signal: bar.signal,
                    reason,
                }),
            }
        }

        let order_book =
            OrderBook::from_trades(&profile.symbol, self.settings.initial_deposit, trades);
        if !order_book.open_trades.is_empty() {
            info!(
                "{} trade(s) on {} still open at the end of their scan window",
                order_book.open_trades.len(),
                profile.symbol
            );
        }
        info!(
            "Finished {} on {}: {} closed trades, {} skipped signals, final equity {:.2}",
            self.strategy_id,
            profile.symbol,
            order_book.len(),
            skipped.len(),
            state.current_equity
        );

        Ok(SimulationRun {
            id: Uuid::new_v4().to_string(),
            strategy_id: self.strategy_id.clone(),
            profile: profile.clone(),
            order_book,
            skipped,
            final_equity: state.current_equity,
            created_at: Utc::now(),
        })
    }

    /// Admits, prices, sizes and resolves a single candidate, then commits it
    /// to `state`.
    fn resolve_candidate(
        &self,
        profile: &SymbolProfile,
        bars: &[MarketBar],
        index: usize,
        trade_id: u64,
        state: &mut EquityState,
    ) -> Result<Trade, SkipReason> {
        let bar = &bars[index];
        let Some(direction) = Direction::from_signal(bar.signal) else {
            warn!(
                "Skipping {} signal at {}: invalid signal value {}",
                profile.symbol, bar.time, bar.signal
            );
            return Err(SkipReason::InvalidSignal);
        };

        let open_positions = match self.check_admission(state, bar.time) {
            AdmissionOutcome::Admitted { open_positions } => open_positions,
            AdmissionOutcome::Rejected(reason) => {
                debug!(
                    "Rejected {} {} at {}: {}",
                    direction.as_str(),
                    profile.symbol,
                    bar.time,
                    reason.as_str()
                );
                return Err(reason);
            }
        };

        let (stop_pips, target_pips) = match risk_distances(bar, direction) {
            Some(distances) => distances,
            None => {
                warn!(
                    "Skipping {} {} at {}: stop/target missing or invalid",
                    direction.as_str(),
                    profile.symbol,
                    bar.time
                );
                return Err(SkipReason::MissingRiskFields);
            }
        };

        let reference_price = bar.entry_price_override(direction).unwrap_or(bar.open);
        if !reference_price.is_finite() {
            warn!(
                "Skipping {} {} at {}: no usable entry price",
                direction.as_str(),
                profile.symbol,
                bar.time
            );
            return Err(SkipReason::NoPriceData);
        }

        let spread_price = profile.spread_price();
        let entry = entry_price(direction, reference_price, spread_price);
        let lot_size = calculate_lot_size(LotSizingParams {
            dynamic: self.config.dynamic_lot_sizing,
            equity: state.current_equity,
            risk_percent: self.config.equity_risk_percent,
            stop_distance_pips: stop_pips,
            fixed_lot: self.config.fixed_lot_size,
            bounds: self.config.lot_bounds,
        });

        let mut trade = Trade {
            id: trade_id,
            direction,
            lot_size,
            symbol: profile.symbol.clone(),
            entry_time: bar.time,
            entry_price: entry,
            stop_loss: stop_loss_price(direction, entry, stop_pips, profile.pip_size),
            take_profit: take_profit_price(direction, entry, target_pips, profile.pip_size),
            exit_time: None,
            exit_price: None,
            exit_reason: None,
            commission: 0.0,
            swap: None,
            profit: None,
            pips: None,
            open_positions_at_entry: open_positions,
            status: TradeStatus::Open,
        };

        let scan = self.scan_for_exit(
            profile,
            bars,
            index,
            direction,
            entry,
            stop_pips,
            target_pips,
        );
        let interval = match scan {
            ScanOutcome::Exited(exit) => {
                let swap = calculate_swap(
                    trade.entry_time,
                    exit.exit_time,
                    profile.swap_rate(direction),
                    lot_size,
                    self.settings.triple_swap_wednesday,
                );
                let profit = settle_profit(exit.pips, lot_size, self.settings.lot_unit, swap);
                trade.exit_time = Some(exit.exit_time);
                trade.exit_price = Some(exit.exit_price);
                trade.exit_reason = Some(exit.reason);
                trade.swap = Some(swap);
                trade.pips = Some(exit.pips);
                trade.profit = Some(profit);
                trade.status = TradeStatus::Closed;
                PositionInterval {
                    entry_time: trade.entry_time,
                    exit_time: exit.exit_time,
                    direction,
                    profit: Some(profit),
                }
            }
            ScanOutcome::Unresolved { window_end } => {
                debug!(
                    "{} {} entered at {} has no exit before {}",
                    direction.as_str(),
                    profile.symbol,
                    trade.entry_time,
                    window_end
                );
                PositionInterval {
                    entry_time: trade.entry_time,
                    exit_time: window_end,
                    direction,
                    profit: None,
                }
            }
        };

        state.commit(interval);
        Ok(trade)
    }

    fn check_admission(&self, state: &mut EquityState, time: DateTime<Utc>) -> AdmissionOutcome {
        let max_positions = self.config.max_concurrent_positions;
        let open_positions = match self.settings.concurrency_rule {
            ConcurrencyRule::OpenPositionList => {
                let open = state.open_count_at(time);
                if open >= max_positions {
                    return AdmissionOutcome::Rejected(SkipReason::MaxOpenPositions);
                }
                open + 1
            }
            ConcurrencyRule::PreviousExitHeuristic => {
                // The counter moves on every candidate, admitted or not.
                if let Some(previous_exit) = state.previous_exit {
                    if time < previous_exit {
                        state.heuristic_counter += 1;
                    } else {
                        state.heuristic_counter = 1;
                    }
                }
                if state.heuristic_counter > max_positions {
                    return AdmissionOutcome::Rejected(SkipReason::MaxOpenPositions);
                }
                state.heuristic_counter
            }
        };

        // A previous trade still open at `time` gives a negative gap.
        let min_gap = self.config.min_minutes_between_entries;
        if min_gap > 0 {
            if let Some(previous_exit) = state.previous_exit() {
                if (time - previous_exit).num_minutes() < min_gap {
                    return AdmissionOutcome::Rejected(SkipReason::MinTimeBetweenEntries);
                }
            }
        }

        AdmissionOutcome::Admitted { open_positions }
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_for_exit(
        &self,
        profile: &SymbolProfile,
        bars: &[MarketBar],
        entry_index: usize,
        direction: Direction,
        entry: f64,
        stop_pips: f64,
        target_pips: f64,
    ) -> ScanOutcome {
        let entry_time = bars[entry_index].time;
        let last_index = entry_index
            .saturating_add(self.settings.lookahead_bars)
            .min(bars.len() - 1);
        let pip = profile.pip_size;
        let spread = profile.spread_pips;

        for index in (entry_index + 1)..=last_index {
            let bar = &bars[index];
            let (adverse, favorable) = match direction {
                Direction::Long => ((entry - bar.low) / pip, (bar.high - entry) / pip),
                Direction::Short => (
                    (bar.high - entry) / pip + spread,
                    (entry - bar.low) / pip - spread,
                ),
            };

            let hit_stop = adverse >= stop_pips;
            let hit_target = favorable >= target_pips;
            let timed_out = self
                .config
                .max_holding_minutes
                .map(|limit| (bar.time - entry_time).num_minutes() > limit)
                .unwrap_or(false);
            let condition_close = bar.close_condition(direction) || timed_out;

            if hit_stop {
                return ScanOutcome::Exited(ExitResolution {
                    exit_time: bar.time,
                    exit_price: stop_loss_price(direction, entry, stop_pips, pip),
                    reason: ExitReason::StopLoss,
                    pips: -stop_pips,
                });
            }
            if condition_close {
                // Executes at the next priced open; without one the trade stays open.
                let Some(next) = bars[(index + 1)..=last_index]
                    .iter()
                    .find(|next| next.open.is_finite())
                else {
                    break;
                };
                let exit_price = market_exit_price(direction, next.open, profile.spread_price());
                return ScanOutcome::Exited(ExitResolution {
                    exit_time: next.time,
                    exit_price,
                    reason: ExitReason::ConditionClose,
                    pips: pips_between(direction, entry, exit_price, pip),
                });
            }
            if hit_target {
                return ScanOutcome::Exited(ExitResolution {
                    exit_time: bar.time,
                    exit_price: take_profit_price(direction, entry, target_pips, pip),
                    reason: ExitReason::TakeProfit,
                    pips: target_pips,
                });
            }
        }

        ScanOutcome::Unresolved {
            window_end: bars[last_index].time,
        }
    }
}

fn risk_distances(bar: &MarketBar, direction: Direction) -> Option<(f64, f64)> {
    let usable = |value: Option<f64>| value.filter(|pips| pips.is_finite() && *pips >= 0.0);
    let stop = usable(bar.stop_loss_pips(direction))?;
    let target = usable(bar.take_profit_pips(direction))?;
    Some((stop, target))
}

pub fn validate_profile(profile: &SymbolProfile) -> Result<(), SimulationError> {
    let invalid = |reason: &str| SimulationError::InvalidProfile {
        symbol: profile.symbol.clone(),
        reason: reason.to_string(),
    };
    if !(profile.pip_size.is_finite() && profile.pip_size > 0.0) {
        return Err(invalid("pip size must be a positive number"));
    }
    if !(profile.spread_pips.is_finite() && profile.spread_pips >= 0.0) {
        return Err(invalid("spread must be a non-negative number"));
    }
    if !profile.swap_long_per_lot.is_finite() || !profile.swap_short_per_lot.is_finite() {
        return Err(invalid("swap rates must be finite"));
    }
    Ok(())
}

pub fn validate_bar_order(bars: &[MarketBar]) -> Result<(), SimulationError> {
    for (index, pair) in bars.windows(2).enumerate() {
        if pair[1].time <= pair[0].time {
            return Err(SimulationError::UnorderedBars {
                index: index + 1,
                time: pair[1].time,
                previous: pair[0].time,
            });
        }
    }
    Ok(())
}
