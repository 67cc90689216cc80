//! Aggregate statistics over a trade ledger.

use serde::{Deserialize, Serialize};

use prediction_replay_core::TradingMode;

use crate::state::StreakStats;
use crate::trade::Trade;

/// Counts and returns for the trades taken in one mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeMetrics {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    /// Wins / trades, 0 when no trades.
    pub win_rate: f64,
    /// Sum of profits of this mode's trades.
    pub net_profit: f64,
    /// `net_profit` relative to the starting bankroll.
    pub roi: f64,
}

impl ModeMetrics {
    fn from_trades<'a>(trades: impl Iterator<Item = &'a Trade>, starting_bankroll: f64) -> Self {
        let mut metrics = Self::default();
        for trade in trades {
            metrics.trades += 1;
            if trade.won {
                metrics.wins += 1;
            } else {
                metrics.losses += 1;
            }
            metrics.net_profit += trade.profit;
        }
        metrics.win_rate = ratio(metrics.wins, metrics.trades);
        if starting_bankroll > 0.0 {
            metrics.roi = metrics.net_profit / starting_bankroll;
        }
        metrics
    }
}

/// Summary of a replay run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    // Counts
    pub total_trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,

    // Bankroll
    pub starting_bankroll: f64,
    pub final_bankroll: f64,
    pub peak_bankroll: f64,
    /// `(final - starting) / starting`.
    pub roi: f64,
    pub net_profit: f64,
    pub total_staked: f64,

    // Risk
    /// Worst decline from a high-water mark, in percent.
    pub max_drawdown_pct: f64,
    pub max_consecutive_losses: u32,
    pub max_consecutive_wins: u32,
    /// Bankroll reached zero; the ledger stops at the bust trade.
    pub busted: bool,

    // Per-mode breakdown
    pub normal: ModeMetrics,
    pub cooldown: ModeMetrics,
}

impl BacktestMetrics {
    /// Aggregates a trade ledger. Pure; the ledger is not modified.
    #[must_use]
    pub fn summarize(trades: &[Trade], starting_bankroll: f64) -> Self {
        if trades.is_empty() {
            return Self::empty(starting_bankroll);
        }

        let total_trades = trades.len() as u32;
        let wins = trades.iter().filter(|t| t.won).count() as u32;
        let losses = total_trades - wins;
        let final_bankroll = trades.last().map_or(starting_bankroll, |t| t.bankroll_after);
        let net_profit = trades.iter().map(|t| t.profit).sum();
        let total_staked = trades.iter().map(|t| t.stake_amount).sum();
        let roi = if starting_bankroll > 0.0 {
            (final_bankroll - starting_bankroll) / starting_bankroll
        } else {
            0.0
        };

        let (peak_bankroll, max_drawdown_pct) = Self::calculate_drawdown(trades, starting_bankroll);
        let (max_consecutive_wins, max_consecutive_losses) = Self::calculate_streaks(trades);

        Self {
            total_trades,
            wins,
            losses,
            win_rate: ratio(wins, total_trades),
            starting_bankroll,
            final_bankroll,
            peak_bankroll,
            roi,
            net_profit,
            total_staked,
            max_drawdown_pct,
            max_consecutive_losses,
            max_consecutive_wins,
            busted: final_bankroll <= 0.0,
            normal: Self::for_mode(trades, TradingMode::Normal, starting_bankroll),
            cooldown: Self::for_mode(trades, TradingMode::Cooldown, starting_bankroll),
        }
    }

    /// Metrics for a run that placed no trades.
    #[must_use]
    pub fn empty(starting_bankroll: f64) -> Self {
        Self {
            total_trades: 0,
            wins: 0,
            losses: 0,
            win_rate: 0.0,
            starting_bankroll,
            final_bankroll: starting_bankroll,
            peak_bankroll: starting_bankroll,
            roi: 0.0,
            net_profit: 0.0,
            total_staked: 0.0,
            max_drawdown_pct: 0.0,
            max_consecutive_losses: 0,
            max_consecutive_wins: 0,
            busted: false,
            normal: ModeMetrics::default(),
            cooldown: ModeMetrics::default(),
        }
    }

    /// Metrics for one mode.
    #[must_use]
    pub fn mode(&self, mode: TradingMode) -> &ModeMetrics {
        match mode {
            TradingMode::Normal => &self.normal,
            TradingMode::Cooldown => &self.cooldown,
        }
    }

    fn for_mode(trades: &[Trade], mode: TradingMode, starting_bankroll: f64) -> ModeMetrics {
        ModeMetrics::from_trades(trades.iter().filter(|t| t.mode == mode), starting_bankroll)
    }

    /// Peak bankroll and maximum percentage drawdown along the ledger.
    fn calculate_drawdown(trades: &[Trade], starting_bankroll: f64) -> (f64, f64) {
        let mut peak = starting_bankroll;
        let mut max_dd = 0.0_f64;

        for trade in trades {
            if trade.bankroll_after > peak {
                peak = trade.bankroll_after;
            }
            if peak > 0.0 {
                let drawdown = (peak - trade.bankroll_after) / peak * 100.0;
                max_dd = max_dd.max(drawdown);
            }
        }

        (peak, max_dd)
    }

    /// Longest win and loss streaks.
    fn calculate_streaks(trades: &[Trade]) -> (u32, u32) {
        let streaks = trades.iter().fold(StreakStats::default(), |mut acc, trade| {
            acc.record(trade.won);
            acc
        });
        (streaks.longest_wins, streaks.longest_losses)
    }
}

fn ratio(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole)
    }
}
