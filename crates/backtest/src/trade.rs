use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use prediction_replay_core::{Direction, TradingMode};

/// One executed bet. Appended to the ledger once settled, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub epoch: u64,
    pub lock_timestamp: i64,
    pub signal: Direction,
    /// Payout of the chosen side implied by the pools at lock.
    pub implied_payout: Option<f64>,
    /// Indicator readings the strategy based the bet on.
    #[serde(default)]
    pub signal_metadata: BTreeMap<String, f64>,
    /// Fraction of the sizing bankroll staked.
    pub stake_fraction: f64,
    pub stake_amount: f64,
    pub mode: TradingMode,
    pub won: bool,
    /// Payout multiple actually received; 0 on a loss.
    pub realized_payout_multiple: f64,
    pub profit: f64,
    pub bankroll_after: f64,
}
