//! Trade signals and the mode they were produced in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::round::Direction;

/// Which strategy is in charge for a given round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    /// Contrarian crowd/momentum strategy.
    #[default]
    Normal,
    /// Circuit breaker tripped; mean-reversion fallback strategy.
    Cooldown,
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Cooldown => f.write_str("cooldown"),
        }
    }
}

/// A decision to bet on one side of a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Side to bet on.
    pub direction: Direction,
    /// Implied payout of that side at lock time; `None` if nobody else
    /// staked on it.
    pub implied_payout: Option<f64>,
    /// Indicator values behind the decision, for analysis. Ordered so that
    /// serialized output is stable across runs.
    #[serde(default)]
    pub metadata: BTreeMap<String, f64>,
}

impl Signal {
    #[must_use]
    pub fn new(direction: Direction, implied_payout: Option<f64>) -> Self {
        Self {
            direction,
            implied_payout,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds metadata to this signal.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
