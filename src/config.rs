use crate::error::SimulationError;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub type Settings = HashMap<String, String>;

pub const DEFAULT_MIN_LOT: f64 = 0.01;
pub const DEFAULT_MAX_LOT: f64 = 5.0;
pub const DEFAULT_INITIAL_DEPOSIT: f64 = 10_000.0;
pub const DEFAULT_LOT_UNIT: f64 = 0.10;
/// Thirty days of minute bars.
pub const DEFAULT_LOOKAHEAD_BARS: usize = 60 * 24 * 30;

/// Lot granularity bounds applied after sizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LotBounds {
    pub min_lot: f64,
    pub max_lot: f64,
}

impl Default for LotBounds {
    fn default() -> Self {
        Self {
            min_lot: DEFAULT_MIN_LOT,
            max_lot: DEFAULT_MAX_LOT,
        }
    }
}

/// Per-strategy risk and admission parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub dynamic_lot_sizing: bool,
    pub equity_risk_percent: f64,
    pub fixed_lot_size: f64,
    pub max_concurrent_positions: usize,
    pub max_holding_minutes: Option<i64>,
    pub min_minutes_between_entries: i64,
    pub lot_bounds: LotBounds,
}

impl StrategyConfig {
    pub fn from_settings_map(settings: &Settings) -> Result<Self, SimulationError> {
        let dynamic_lot_sizing = require_setting_bool(settings, "DYNAMIC_LOT_SIZE")?;
        let equity_risk_percent =
            require_setting_f64(settings, "EQUITY_RISK_PERCENT", Some(0.0), Some(100.0))?;
        let fixed_lot_size = require_setting_f64(settings, "FIXED_LOT_SIZE", Some(0.0), None)?;
        let max_concurrent_positions = require_setting_usize(settings, "MAX_OPEN_TRADES", 1)?;
        let max_holding_minutes = if has_setting(settings, "MAX_MINUTES_OPEN_TRADE") {
            Some(require_setting_usize(settings, "MAX_MINUTES_OPEN_TRADE", 1)? as i64)
        } else {
            None
        };
        let min_minutes_between_entries = if has_setting(settings, "MIN_MINUTES_BETWEEN_TRADES") {
            require_setting_usize(settings, "MIN_MINUTES_BETWEEN_TRADES", 0)? as i64
        } else {
            0
        };
        let min_lot = optional_setting_f64(settings, "MIN_LOT_SIZE", DEFAULT_MIN_LOT, Some(0.0))?;
        let max_lot = optional_setting_f64(settings, "MAX_LOT_SIZE", DEFAULT_MAX_LOT, Some(0.0))?;

        let config = Self {
            dynamic_lot_sizing,
            equity_risk_percent,
            fixed_lot_size,
            max_concurrent_positions,
            max_holding_minutes,
            min_minutes_between_entries,
            lot_bounds: LotBounds { min_lot, max_lot },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        let LotBounds { min_lot, max_lot } = self.lot_bounds;
        if !min_lot.is_finite() || !max_lot.is_finite() || min_lot <= 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "lot bounds must be finite and positive (min: {}, max: {})",
                min_lot, max_lot
            )));
        }
        if max_lot < min_lot {
            return Err(SimulationError::InvalidConfig(format!(
                "MAX_LOT_SIZE ({}) must be >= MIN_LOT_SIZE ({})",
                max_lot, min_lot
            )));
        }
        if self.max_concurrent_positions == 0 {
            return Err(SimulationError::InvalidConfig(
                "MAX_OPEN_TRADES must be at least 1".to_string(),
            ));
        }
        if !self.dynamic_lot_sizing && self.fixed_lot_size <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "FIXED_LOT_SIZE must be > 0 when dynamic lot sizing is disabled".to_string(),
            ));
        }
        if self.dynamic_lot_sizing && self.equity_risk_percent <= 0.0 {
            return Err(SimulationError::InvalidConfig(
                "EQUITY_RISK_PERCENT must be > 0 when dynamic lot sizing is enabled".to_string(),
            ));
        }
        if self.min_minutes_between_entries < 0 {
            return Err(SimulationError::InvalidConfig(
                "MIN_MINUTES_BETWEEN_TRADES must be >= 0".to_string(),
            ));
        }
        if matches!(self.max_holding_minutes, Some(minutes) if minutes <= 0) {
            return Err(SimulationError::InvalidConfig(
                "MAX_MINUTES_OPEN_TRADE must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// How open positions are counted when admitting a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyRule {
    /// Count positions whose exit lies after the candidate time.
    OpenPositionList,
    /// Legacy rule: a running counter that grows while each entry precedes
    /// the previous trade's exit and resets to one otherwise.
    PreviousExitHeuristic,
}

impl ConcurrencyRule {
    pub fn parse(raw: &str) -> Result<Self, SimulationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open_positions" | "open_position_list" | "list" => Ok(Self::OpenPositionList),
            "previous_exit" | "previous_exit_heuristic" | "heuristic" => {
                Ok(Self::PreviousExitHeuristic)
            }
            other => Err(SimulationError::invalid_setting(
                "CONCURRENCY_RULE",
                other,
                "must be OPEN_POSITIONS or PREVIOUS_EXIT",
            )),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OpenPositionList => "open positions",
            Self::PreviousExitHeuristic => "previous exit heuristic",
        }
    }
}

/// Run-level knobs shared by every symbol in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub initial_deposit: f64,
    /// Lot size at which one pip is worth one currency unit.
    pub lot_unit: f64,
    pub lookahead_bars: usize,
    pub concurrency_rule: ConcurrencyRule,
    pub triple_swap_wednesday: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            initial_deposit: DEFAULT_INITIAL_DEPOSIT,
            lot_unit: DEFAULT_LOT_UNIT,
            lookahead_bars: DEFAULT_LOOKAHEAD_BARS,
            concurrency_rule: ConcurrencyRule::OpenPositionList,
            triple_swap_wednesday: true,
        }
    }
}

impl SimulationSettings {
    pub fn from_settings_map(settings: &Settings) -> Result<Self, SimulationError> {
        let defaults = Self::default();
        let initial_deposit = optional_setting_f64(
            settings,
            "INITIAL_DEPOSIT",
            defaults.initial_deposit,
            Some(0.0),
        )?;
        let lot_unit = optional_setting_f64(settings, "LOT_UNIT", defaults.lot_unit, Some(0.0))?;
        let lookahead_bars = if has_setting(settings, "LOOKAHEAD_BARS") {
            require_setting_usize(settings, "LOOKAHEAD_BARS", 1)?
        } else {
            defaults.lookahead_bars
        };
        let concurrency_rule = match settings
            .get("CONCURRENCY_RULE")
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
        {
            Some(raw) => ConcurrencyRule::parse(raw)?,
            None => defaults.concurrency_rule,
        };
        let triple_swap_wednesday = if has_setting(settings, "TRIPLE_SWAP_WEDNESDAY") {
            require_setting_bool(settings, "TRIPLE_SWAP_WEDNESDAY")?
        } else {
            defaults.triple_swap_wednesday
        };

        let parsed = Self {
            initial_deposit,
            lot_unit,
            lookahead_bars,
            concurrency_rule,
            triple_swap_wednesday,
        };
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if !(self.initial_deposit.is_finite() && self.initial_deposit > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "INITIAL_DEPOSIT must be > 0 (value: {})",
                self.initial_deposit
            )));
        }
        if !(self.lot_unit.is_finite() && self.lot_unit > 0.0) {
            return Err(SimulationError::InvalidConfig(format!(
                "LOT_UNIT must be > 0 (value: {})",
                self.lot_unit
            )));
        }
        if self.lookahead_bars == 0 {
            return Err(SimulationError::InvalidConfig(
                "LOOKAHEAD_BARS must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads a flat settings file: a JSON object of strings/numbers/bools, or
/// `KEY=VALUE` lines with `#` comments.
pub fn load_settings_file(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    parse_settings(&raw).with_context(|| format!("Failed to parse settings {}", path.display()))
}

pub fn parse_settings(raw: &str) -> Result<Settings> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') {
        let value: serde_json::Value = serde_json::from_str(trimmed)?;
        let object = value
            .as_object()
            .ok_or_else(|| anyhow!("Settings JSON must be an object"))?;
        let mut settings = Settings::with_capacity(object.len());
        for (key, value) in object {
            let text = match value {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Number(number) => number.to_string(),
                serde_json::Value::Bool(flag) => flag.to_string(),
                serde_json::Value::Null => continue,
                other => return Err(anyhow!("Setting {} has unsupported value {}", key, other)),
            };
            settings.insert(key.trim().to_string(), text);
        }
        return Ok(settings);
    }

    let mut settings = Settings::new();
    for (line_number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| anyhow!("Line {} is not KEY=VALUE: {}", line_number + 1, line))?;
        settings.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(settings)
}

fn has_setting(settings: &Settings, key: &str) -> bool {
    settings
        .get(key)
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

fn require_setting<'a>(settings: &'a Settings, key: &str) -> Result<&'a str, SimulationError> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| SimulationError::MissingSetting(key.to_string()))
}

fn require_setting_bool(settings: &Settings, key: &str) -> Result<bool, SimulationError> {
    let raw = require_setting(settings, key)?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SimulationError::invalid_setting(
            key,
            raw,
            "must be a boolean",
        )),
    }
}

fn require_setting_f64(
    settings: &Settings,
    key: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<f64, SimulationError> {
    let raw = require_setting(settings, key)?;
    let value = raw
        .parse::<f64>()
        .map_err(|_| SimulationError::invalid_setting(key, raw, "must be a number"))?;
    if !value.is_finite() {
        return Err(SimulationError::invalid_setting(key, raw, "must be finite"));
    }
    if let Some(min_value) = min {
        if value < min_value {
            return Err(SimulationError::invalid_setting(
                key,
                raw,
                format!("must be >= {}", min_value),
            ));
        }
    }
    if let Some(max_value) = max {
        if value > max_value {
            return Err(SimulationError::invalid_setting(
                key,
                raw,
                format!("must be <= {}", max_value),
            ));
        }
    }
    Ok(value)
}

fn optional_setting_f64(
    settings: &Settings,
    key: &str,
    default: f64,
    min: Option<f64>,
) -> Result<f64, SimulationError> {
    if has_setting(settings, key) {
        require_setting_f64(settings, key, min, None)
    } else {
        Ok(default)
    }
}

fn require_setting_usize(
    settings: &Settings,
    key: &str,
    min: usize,
) -> Result<usize, SimulationError> {
    let raw = require_setting(settings, key)?;
    let value = raw
        .parse::<f64>()
        .map_err(|_| SimulationError::invalid_setting(key, raw, "must be a number"))?;
    if !value.is_finite() {
        return Err(SimulationError::invalid_setting(key, raw, "must be finite"));
    }
    if value.fract() != 0.0 {
        return Err(SimulationError::invalid_setting(
            key,
            raw,
            "must be an integer",
        ));
    }
    if value < min as f64 {
        return Err(SimulationError::invalid_setting(
            key,
            raw,
            format!("must be >= {}", min),
        ));
    }
    Ok(value as usize)
}
