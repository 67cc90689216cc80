//! Dynamic stake sizing.
//!
//! ```text
//! fraction = base
//!          * momentum_multiplier   (normal mode, |momentum_gap| >= gap threshold)
//!          * recovery_multiplier   (either mode, last two trades lost)
//! stake    = fraction * min(bankroll, bankroll_cap), clamped to [0, bankroll]
//! ```

use prediction_replay_core::{BacktestConfig, RoundRecord, TradingMode};

use crate::state::SimulationState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    base_fraction: f64,
    momentum_gap_threshold: f64,
    momentum_multiplier: f64,
    recovery_multiplier: f64,
    bankroll_cap: Option<f64>,
}

impl PositionSizer {
    #[must_use]
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self {
            base_fraction: config.base_position_fraction,
            momentum_gap_threshold: config.momentum_gap_threshold,
            momentum_multiplier: config.momentum_multiplier,
            recovery_multiplier: config.recovery_multiplier,
            bankroll_cap: config.bankroll_cap,
        }
    }

    /// Fraction of the sizing bankroll to stake, in (0, 1].
    #[must_use]
    pub fn size(&self, state: &SimulationState, round: &RoundRecord, mode: TradingMode) -> f64 {
        let mut fraction = self.base_fraction;
        if mode == TradingMode::Normal && self.is_strong_momentum(round) {
            fraction *= self.momentum_multiplier;
        }
        if state.last_two_outcomes.all_losses() {
            fraction *= self.recovery_multiplier;
        }
        fraction.min(1.0)
    }

    /// Absolute stake for `fraction` given the current bankroll.
    #[must_use]
    pub fn stake_amount(&self, fraction: f64, bankroll: f64) -> f64 {
        let sizing_bankroll = match self.bankroll_cap {
            Some(cap) => bankroll.min(cap),
            None => bankroll,
        };
        (fraction * sizing_bankroll).clamp(0.0, bankroll.max(0.0))
    }

    fn is_strong_momentum(&self, round: &RoundRecord) -> bool {
        round.momentum_gap.abs() >= self.momentum_gap_threshold
    }
}
