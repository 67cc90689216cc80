//! Loss-streak circuit breaker.
//!
//! Two states, cycling for the whole run:
//!
//! ```text
//!            consecutive normal-mode losses >= loss_threshold
//!   NORMAL ------------------------------------------------> COOLDOWN
//!     ^                                                          |
//!     +------------ lock_timestamp >= cooldown_until ------------+
//! ```
//!
//! While in cooldown the engine asks the fallback signal source instead of
//! the normal one. Cooldown trades never touch the loss counter.

use serde::{Deserialize, Serialize};

use prediction_replay_core::{BacktestConfig, TradingMode};

/// Circuit breaker counters, stored in `SimulationState`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskState {
    /// Normal-mode losses since the last normal-mode win or trigger.
    pub consecutive_losses: u32,
    /// Lock timestamp at which an active cooldown ends.
    pub cooldown_until_timestamp: Option<i64>,
}

impl RiskState {
    #[must_use]
    pub fn in_cooldown(&self) -> bool {
        self.cooldown_until_timestamp.is_some()
    }
}

/// Emitted when the breaker trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownTrigger {
    /// Lock timestamp of the loss that tripped the breaker.
    pub triggered_at: i64,
    /// Cooldown end; rounds locking at or after this are normal again.
    pub until: i64,
}

/// Stateless policy: all counters live in `RiskState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskController {
    loss_threshold: u32,
    cooldown_duration_seconds: i64,
}

impl RiskController {
    #[must_use]
    pub const fn new(loss_threshold: u32, cooldown_duration_seconds: i64) -> Self {
        Self {
            loss_threshold,
            cooldown_duration_seconds,
        }
    }

    #[must_use]
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(config.loss_threshold, config.cooldown_duration_seconds)
    }

    /// Resolves the mode for a round locking at `lock_timestamp`, releasing an
    /// expired cooldown first. Returns the mode and whether a release happened.
    pub fn observe(&self, state: &mut RiskState, lock_timestamp: i64) -> (TradingMode, bool) {
        match state.cooldown_until_timestamp {
            Some(until) if lock_timestamp >= until => {
                state.cooldown_until_timestamp = None;
                (TradingMode::Normal, true)
            }
            Some(_) => (TradingMode::Cooldown, false),
            None => (TradingMode::Normal, false),
        }
    }

    /// Records a settled trade. Only normal-mode trades count toward or reset
    /// the streak.
    pub fn record_outcome(
        &self,
        state: &mut RiskState,
        mode: TradingMode,
        won: bool,
        lock_timestamp: i64,
    ) -> Option<CooldownTrigger> {
        if mode == TradingMode::Cooldown {
            return None;
        }
        if won {
            state.consecutive_losses = 0;
            return None;
        }

        state.consecutive_losses += 1;
        if state.consecutive_losses < self.loss_threshold {
            return None;
        }

        let until = lock_timestamp.saturating_add(self.cooldown_duration_seconds);
        state.cooldown_until_timestamp = Some(until);
        state.consecutive_losses = 0;
        Some(CooldownTrigger {
            triggered_at: lock_timestamp,
            until,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> RiskController {
        RiskController::new(3, 3600)
    }

    #[test]
    fn starts_normal() {
        let mut state = RiskState::default();
        assert_eq!(controller().observe(&mut state, 100), (TradingMode::Normal, false));
    }

    #[test]
    fn trips_after_threshold_losses() {
        let risk = controller();
        let mut state = RiskState::default();
        assert!(risk.record_outcome(&mut state, TradingMode::Normal, false, 100).is_none());
        assert!(risk.record_outcome(&mut state, TradingMode::Normal, false, 400).is_none());
        let trigger = risk
            .record_outcome(&mut state, TradingMode::Normal, false, 700)
            .unwrap();

        assert_eq!(trigger.triggered_at, 700);
        assert_eq!(trigger.until, 700 + 3600);
        assert_eq!(state.cooldown_until_timestamp, Some(4300));
        assert_eq!(state.consecutive_losses, 0);
        assert_eq!(risk.observe(&mut state, 1000).0, TradingMode::Cooldown);
    }

    #[test]
    fn win_resets_streak() {
        let risk = controller();
        let mut state = RiskState::default();
        risk.record_outcome(&mut state, TradingMode::Normal, false, 100);
        risk.record_outcome(&mut state, TradingMode::Normal, false, 200);
        risk.record_outcome(&mut state, TradingMode::Normal, true, 300);
        assert_eq!(state.consecutive_losses, 0);
        assert!(risk.record_outcome(&mut state, TradingMode::Normal, false, 400).is_none());
        assert!(!state.in_cooldown());
    }

    #[test]
    fn cooldown_trades_do_not_count() {
        let risk = controller();
        let mut state = RiskState {
            consecutive_losses: 0,
            cooldown_until_timestamp: Some(5000),
        };
        for ts in [1000, 1300, 1600, 1900] {
            assert!(risk.record_outcome(&mut state, TradingMode::Cooldown, false, ts).is_none());
        }
        assert_eq!(state.consecutive_losses, 0);

        state.consecutive_losses = 2;
        risk.record_outcome(&mut state, TradingMode::Cooldown, true, 2000);
        assert_eq!(state.consecutive_losses, 2);
    }

    #[test]
    fn releases_at_exact_deadline() {
        let risk = controller();
        let mut state = RiskState {
            consecutive_losses: 0,
            cooldown_until_timestamp: Some(5000),
        };
        assert_eq!(risk.observe(&mut state, 4999), (TradingMode::Cooldown, false));
        assert_eq!(risk.observe(&mut state, 5000), (TradingMode::Normal, true));
        assert_eq!(state.cooldown_until_timestamp, None);
    }

    #[test]
    fn cooldown_ending_at_epoch_zero_still_applies() {
        let risk = RiskController::new(1, 1000);
        let mut state = RiskState::default();
        let trigger = risk
            .record_outcome(&mut state, TradingMode::Normal, false, -1000)
            .unwrap();

        assert_eq!(trigger.until, 0);
        assert!(state.in_cooldown());
        assert_eq!(risk.observe(&mut state, -500), (TradingMode::Cooldown, false));
        assert_eq!(risk.observe(&mut state, 0), (TradingMode::Normal, true));
    }
}
