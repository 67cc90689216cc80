//! Mutable state of a single replay run.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::risk::RiskState;

/// Number of recent outcomes the recovery sizing rule looks at.
pub const RECENT_OUTCOME_WINDOW: usize = 2;

/// Bounded FIFO of the most recent trade results (`true` = win).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentOutcomes(VecDeque<bool>);

impl RecentOutcomes {
    /// Records an outcome, evicting the oldest once the window is full.
    pub fn push(&mut self, won: bool) {
        if self.0.len() == RECENT_OUTCOME_WINDOW {
            self.0.pop_front();
        }
        self.0.push_back(won);
    }

    /// True when the window is full and every outcome in it is a loss.
    #[must_use]
    pub fn all_losses(&self) -> bool {
        self.0.len() == RECENT_OUTCOME_WINDOW && self.0.iter().all(|won| !won)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Outcomes oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &bool> {
        self.0.iter()
    }
}

/// Win/loss streak bookkeeping across all trades, regardless of mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakStats {
    pub current_wins: u32,
    pub current_losses: u32,
    pub longest_wins: u32,
    pub longest_losses: u32,
}

impl StreakStats {
    pub fn record(&mut self, won: bool) {
        if won {
            self.current_wins += 1;
            self.current_losses = 0;
            self.longest_wins = self.longest_wins.max(self.current_wins);
        } else {
            self.current_losses += 1;
            self.current_wins = 0;
            self.longest_losses = self.longest_losses.max(self.current_losses);
        }
    }
}

/// Everything a replay run mutates. Created fresh per run and owned by the
/// engine for its duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Current capital.
    pub bankroll: f64,
    /// High-water mark of `bankroll`.
    pub peak_bankroll: f64,
    /// Worst decline from the high-water mark, in percent.
    pub max_drawdown_pct: f64,
    /// Last two results, for the recovery sizing rule.
    pub last_two_outcomes: RecentOutcomes,
    /// Circuit breaker counters.
    pub risk: RiskState,
    /// Streaks across all trades.
    pub streaks: StreakStats,
}

impl SimulationState {
    #[must_use]
    pub fn new(starting_bankroll: f64) -> Self {
        Self {
            bankroll: starting_bankroll,
            peak_bankroll: starting_bankroll,
            max_drawdown_pct: 0.0,
            last_two_outcomes: RecentOutcomes::default(),
            risk: RiskState::default(),
            streaks: StreakStats::default(),
        }
    }

    /// Applies a settled trade's profit and outcome.
    pub fn settle(&mut self, profit: f64, won: bool) {
        self.bankroll += profit;
        if self.bankroll > self.peak_bankroll {
            self.peak_bankroll = self.bankroll;
        }
        if self.peak_bankroll > 0.0 {
            let drawdown = (self.peak_bankroll - self.bankroll) / self.peak_bankroll * 100.0;
            self.max_drawdown_pct = self.max_drawdown_pct.max(drawdown);
        }
        self.last_two_outcomes.push(won);
        self.streaks.record(won);
    }

    /// Bankroll exhausted; the run must stop.
    #[must_use]
    pub fn is_bust(&self) -> bool {
        self.bankroll <= 0.0
    }
}
