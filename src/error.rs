//! Errors raised before a simulation run starts.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Fatal input problems. Anything recoverable per candidate is logged and
/// skipped inside the engine instead.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Required setting absent or blank
    #[error("Missing required setting {0}")]
    MissingSetting(String),

    /// Setting present but unusable
    #[error("Setting {key} {reason} (value: {value})")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },

    /// Settings that are individually valid but contradict each other
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Symbol profile with unusable pip size, spread or swap
    #[error("invalid symbol profile for {symbol}: {reason}")]
    InvalidProfile { symbol: String, reason: String },

    /// Bar series not strictly increasing in time
    #[error("bar {index} at {time} is not after previous bar at {previous}")]
    UnorderedBars {
        index: usize,
        time: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
}

impl SimulationError {
    pub(crate) fn invalid_setting(key: &str, value: &str, reason: impl Into<String>) -> Self {
        SimulationError::InvalidSetting {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SimulationError::MissingSetting(_)
                | SimulationError::InvalidSetting { .. }
                | SimulationError::InvalidConfig(_)
        )
    }
}
