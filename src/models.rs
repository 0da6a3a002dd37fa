use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn from_signal(signal: i8) -> Option<Self> {
        match signal {
            1 => Some(Direction::Long),
            -1 => Some(Direction::Short),
            _ => None,
        }
    }

    /// +1 for longs, -1 for shorts.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "Long",
            Direction::Short => "Short",
        }
    }
}

/// One minute bar with the fields attached by the signal generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketBar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub signal: i8,
    #[serde(default)]
    pub stop_loss_long_pips: Option<f64>,
    #[serde(default)]
    pub take_profit_long_pips: Option<f64>,
    #[serde(default)]
    pub stop_loss_short_pips: Option<f64>,
    #[serde(default)]
    pub take_profit_short_pips: Option<f64>,
    #[serde(default)]
    pub close_condition_long: bool,
    #[serde(default)]
    pub close_condition_short: bool,
    #[serde(default)]
    pub entry_price_long: Option<f64>,
    #[serde(default)]
    pub entry_price_short: Option<f64>,
}

impl MarketBar {
    pub fn stop_loss_pips(&self, direction: Direction) -> Option<f64> {
        match direction {
            Direction::Long => self.stop_loss_long_pips,
            Direction::Short => self.stop_loss_short_pips,
        }
    }

    pub fn take_profit_pips(&self, direction: Direction) -> Option<f64> {
        match direction {
            Direction::Long => self.take_profit_long_pips,
            Direction::Short => self.take_profit_short_pips,
        }
    }

    pub fn close_condition(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.close_condition_long,
            Direction::Short => self.close_condition_short,
        }
    }

    pub fn entry_price_override(&self, direction: Direction) -> Option<f64> {
        match direction {
            Direction::Long => self.entry_price_long,
            Direction::Short => self.entry_price_short,
        }
        .filter(|price| price.is_finite())
    }
}

/// Pip size, spread and overnight financing of one symbol, in pip units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SymbolProfile {
    pub symbol: String,
    pub pip_size: f64,
    pub spread_pips: f64,
    pub swap_long_per_lot: f64,
    pub swap_short_per_lot: f64,
}

impl SymbolProfile {
    /// Broker reference tables quote point size, spread and swaps in points;
    /// one pip is ten points.
    pub fn from_broker_units(
        symbol: &str,
        point: f64,
        spread_points: f64,
        swap_long_points: f64,
        swap_short_points: f64,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            pip_size: point * 10.0,
            spread_pips: spread_points * 0.1,
            swap_long_per_lot: swap_long_points * 0.1,
            swap_short_per_lot: swap_short_points * 0.1,
        }
    }

    pub fn swap_rate(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.swap_long_per_lot,
            Direction::Short => self.swap_short_per_lot,
        }
    }

    /// Spread expressed as a price offset.
    pub fn spread_price(&self) -> f64 {
        self.spread_pips * self.pip_size
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    ConditionClose,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::ConditionClose => "condition_close",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeStatus {
    Closed,
    Open,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Closed => "closed",
            TradeStatus::Open => "open",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub direction: Direction,
    pub lot_size: f64,
    pub symbol: String,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<ExitReason>,
    pub commission: f64,
    pub swap: Option<f64>,
    pub profit: Option<f64>,
    pub pips: Option<f64>,
    pub open_positions_at_entry: usize,
    pub status: TradeStatus,
}

impl Trade {
    pub fn is_resolved(&self) -> bool {
        self.status == TradeStatus::Closed && self.profit.is_some() && self.exit_time.is_some()
    }

    /// Realized profit, zero for trades that never closed.
    pub fn realized_profit(&self) -> f64 {
        self.profit.unwrap_or(0.0)
    }
}

/// A resolved trade with the running balance after it settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookRow {
    pub trade: Trade,
    pub balance: f64,
    pub return_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    pub initial_deposit: f64,
    pub entries: Vec<OrderBookRow>,
    pub open_trades: Vec<Trade>,
}

impl OrderBook {
    /// Splits trades into resolved entries (with balance columns) and
    /// still-open trades. Input must be in entry order.
    pub fn from_trades(symbol: &str, initial_deposit: f64, trades: Vec<Trade>) -> Self {
        let mut entries = Vec::with_capacity(trades.len());
        let mut open_trades = Vec::new();
        let mut balance = initial_deposit;

        for trade in trades {
            if !trade.is_resolved() {
                open_trades.push(trade);
                continue;
            }
            balance += trade.realized_profit();
            let return_percent = if initial_deposit != 0.0 {
                (balance - initial_deposit) / initial_deposit * 100.0
            } else {
                0.0
            };
            entries.push(OrderBookRow {
                trade,
                balance,
                return_percent,
            });
        }

        Self {
            symbol: symbol.to_string(),
            initial_deposit,
            entries,
            open_trades,
        }
    }

    pub fn resolved_trades(&self) -> impl Iterator<Item = &Trade> + '_ {
        self.entries.iter().map(|entry| &entry.trade)
    }

    pub fn balances(&self) -> Vec<f64> {
        self.entries.iter().map(|entry| entry.balance).collect()
    }

    /// Balance curve starting with the initial deposit.
    pub fn balance_curve(&self) -> Vec<f64> {
        let mut curve = Vec::with_capacity(self.entries.len() + 1);
        curve.push(self.initial_deposit);
        curve.extend(self.entries.iter().map(|entry| entry.balance));
        curve
    }

    pub fn final_balance(&self) -> f64 {
        self.entries
            .last()
            .map(|entry| entry.balance)
            .unwrap_or(self.initial_deposit)
    }

    pub fn net_profit(&self) -> f64 {
        self.final_balance() - self.initial_deposit
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipReason {
    MaxOpenPositions,
    MinTimeBetweenEntries,
    MissingRiskFields,
    InvalidSignal,
    NoPriceData,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MaxOpenPositions => "max_open_positions",
            SkipReason::MinTimeBetweenEntries => "min_time_between_entries",
            SkipReason::MissingRiskFields => "missing_risk_fields",
            SkipReason::InvalidSignal => "invalid_signal",
            SkipReason::NoPriceData => "no_price_data",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSkip {
    pub time: DateTime<Utc>,
    pub signal: i8,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRun {
    pub id: String,
    pub strategy_id: String,
    pub profile: SymbolProfile,
    pub order_book: OrderBook,
    pub skipped: Vec<SignalSkip>,
    pub final_equity: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    pub trades: usize,
    pub profit: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownInfo {
    pub absolute_drawdown: f64,
    pub maximal_drawdown: f64,
    pub maximal_drawdown_percent: f64,
    pub relative_drawdown_balance_percent: f64,
    pub relative_drawdown_equity_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct YearlyReturn {
    pub year: i32,
    /// Index 0 is January; months outside the traded range stay at zero.
    pub months: [f64; 12],
    pub return_percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReturnTable {
    pub months: Vec<MonthlyReturn>,
    pub years: Vec<YearlyReturn>,
    pub overall_return_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyStatistics {
    pub symbol: String,
    pub initial_deposit: f64,
    pub final_balance: f64,
    pub net_profit: f64,
    pub net_profit_percent: f64,
    pub total_trades: usize,
    pub open_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub long_trades_won: usize,
    pub short_trades_won: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub gross_profit: f64,
    pub gross_profit_pips: f64,
    pub gross_loss: f64,
    pub gross_loss_pips: f64,
    pub expected_payoff: f64,
    pub avg_winning_trade: f64,
    pub avg_losing_trade: f64,
    pub profit_factor: f64,
    pub max_consecutive_wins: StreakSummary,
    pub max_consecutive_profit: StreakSummary,
    pub max_consecutive_losses: StreakSummary,
    pub max_consecutive_loss: StreakSummary,
    pub trading_activity_percent: Option<f64>,
    pub sharpe_ratio: f64,
    pub max_drawdown_ratio: f64,
    pub recovery_factor: f64,
    pub drawdowns: DrawdownInfo,
    pub avg_holding_minutes: f64,
    pub trades_per_week: Option<f64>,
    pub returns: ReturnTable,
}

pub fn generate_book_file_stem(symbol: &str, strategy_id: &str) -> String {
    format!("{}_{}", symbol, strategy_id)
}
