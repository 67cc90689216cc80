//! Round-by-round replay engine.
//!
//! # Design Principles
//!
//! 1. **Causal replay**: rounds are consumed in non-decreasing
//!    `lock_timestamp` order. The engine never sorts; a round that goes
//!    backwards in time aborts the run before any state changes.
//!
//! 2. **Explicit state**: everything a run mutates lives in a
//!    `SimulationState` created at run start. Independent runs can share the
//!    same round slice.
//!
//! 3. **Two strategies, one selector**: the circuit breaker's mode picks the
//!    normal or fallback `SignalSource` for each round.
//!
//! # Example
//!
//! ```ignore
//! let engine = ReplayEngine::new(BacktestConfig::default())?;
//! let results = engine.run(&rounds)?;
//! println!("ROI: {:.2}%", results.metrics.roi * 100.0);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use prediction_replay_core::{BacktestConfig, MomentumSignal, RoundRecord, TradingMode};

use crate::error::ReplayError;
use crate::metrics::BacktestMetrics;
use crate::risk::RiskController;
use crate::signal_source::{ContrarianSignal, MeanReversionSignal, SignalSource};
use crate::sizing::PositionSizer;
use crate::state::SimulationState;
use crate::trade::Trade;

/// Why a round produced no trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Winner is DRAW or UNKNOWN.
    Unresolved,
    /// Neither side had any stake.
    EmptyPool,
    /// The active strategy declined the round.
    NoSignal,
    /// Winning round without a usable payout multiple.
    MissingPayout,
}

/// Rounds skipped, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub unresolved: usize,
    pub empty_pool: usize,
    pub no_signal: usize,
    pub missing_payout: usize,
}

impl SkipCounts {
    fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Unresolved => self.unresolved += 1,
            SkipReason::EmptyPool => self.empty_pool += 1,
            SkipReason::NoSignal => self.no_signal += 1,
            SkipReason::MissingPayout => self.missing_payout += 1,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.unresolved + self.empty_pool + self.no_signal + self.missing_payout
    }
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResults {
    /// Executed trades in replay order.
    pub trades: Vec<Trade>,
    /// State at the end of the run (or at the bust).
    pub final_state: SimulationState,
    /// Aggregates over `trades`.
    pub metrics: BacktestMetrics,
    /// Rounds that produced no trade.
    pub skipped: SkipCounts,
    /// Rounds consumed before the run ended.
    pub rounds_seen: usize,
    /// Run stopped early because the bankroll hit zero.
    pub busted: bool,
    /// Configuration used for the run.
    pub config: BacktestConfig,
}

impl BacktestResults {
    /// Trades placed / rounds seen.
    #[must_use]
    pub fn fill_rate(&self) -> f64 {
        if self.rounds_seen == 0 {
            return 0.0;
        }
        self.trades.len() as f64 / self.rounds_seen as f64
    }
}

/// Replays historical rounds through the strategy stack.
pub struct ReplayEngine {
    config: BacktestConfig,
    normal: Box<dyn SignalSource>,
    fallback: Box<dyn SignalSource>,
    sizer: PositionSizer,
    risk: RiskController,
}

impl std::fmt::Debug for ReplayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayEngine")
            .field("config", &self.config)
            .field("normal", &self.normal.name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl ReplayEngine {
    /// Creates an engine with the contrarian and mean-reversion strategies.
    ///
    /// # Errors
    /// Returns `ReplayError::Config` if the configuration is invalid.
    pub fn new(config: BacktestConfig) -> Result<Self, ReplayError> {
        let normal = Box::new(ContrarianSignal::from_config(&config));
        let fallback = Box::new(MeanReversionSignal::from_config(&config));
        Self::with_sources(config, normal, fallback)
    }

    /// Creates an engine with custom strategies.
    ///
    /// # Errors
    /// Returns `ReplayError::Config` if the configuration is invalid.
    pub fn with_sources(
        config: BacktestConfig,
        normal: Box<dyn SignalSource>,
        fallback: Box<dyn SignalSource>,
    ) -> Result<Self, ReplayError> {
        config.validate()?;
        Ok(Self {
            sizer: PositionSizer::from_config(&config),
            risk: RiskController::from_config(&config),
            config,
            normal,
            fallback,
        })
    }

    /// Returns a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Replays `rounds` in the order given.
    ///
    /// Stops early, without error, once the bankroll is exhausted.
    ///
    /// # Errors
    /// Returns `ReplayError::OutOfOrder` if a round locks before its
    /// predecessor. No partial results are returned.
    pub fn run<'a, I>(&self, rounds: I) -> Result<BacktestResults, ReplayError>
    where
        I: IntoIterator<Item = &'a RoundRecord>,
    {
        let mut state = SimulationState::new(self.config.starting_bankroll);
        let mut trades = Vec::new();
        let mut skipped = SkipCounts::default();
        let mut rounds_seen = 0usize;
        let mut previous_timestamp: Option<i64> = None;
        let mut busted = false;

        for round in rounds {
            if let Some(previous) = previous_timestamp {
                if round.lock_timestamp < previous {
                    return Err(ReplayError::OutOfOrder {
                        epoch: round.epoch,
                        lock_timestamp: round.lock_timestamp,
                        previous_timestamp: previous,
                    });
                }
            }
            previous_timestamp = Some(round.lock_timestamp);
            rounds_seen += 1;

            let (mode, released) = self.risk.observe(&mut state.risk, round.lock_timestamp);
            if released {
                info!(
                    epoch = round.epoch,
                    lock_timestamp = round.lock_timestamp,
                    "Cooldown expired, resuming normal strategy"
                );
            }

            let trade = match self.evaluate(round, &state, mode) {
                Ok(trade) => trade,
                Err(reason) => {
                    debug!(epoch = round.epoch, ?reason, %mode, "Skipping round");
                    skipped.record(reason);
                    continue;
                }
            };

            state.settle(trade.profit, trade.won);
            if let Some(trigger) =
                self.risk
                    .record_outcome(&mut state.risk, mode, trade.won, round.lock_timestamp)
            {
                info!(
                    epoch = round.epoch,
                    triggered_at = trigger.triggered_at,
                    until = trigger.until,
                    "Loss streak hit {}, switching to {} for {}s",
                    self.config.loss_threshold,
                    self.fallback.name(),
                    self.config.cooldown_duration_seconds
                );
            }

            debug!(
                epoch = trade.epoch,
                signal = %trade.signal,
                %mode,
                won = trade.won,
                stake = trade.stake_amount,
                profit = trade.profit,
                bankroll = trade.bankroll_after,
                "Settled trade"
            );
            trades.push(trade);

            if state.is_bust() {
                warn!(
                    epoch = round.epoch,
                    bankroll = state.bankroll,
                    "Bankroll exhausted, stopping replay"
                );
                busted = true;
                break;
            }
        }

        let metrics = BacktestMetrics::summarize(&trades, self.config.starting_bankroll);
        info!(
            rounds = rounds_seen,
            trades = metrics.total_trades,
            win_rate = metrics.win_rate,
            roi = metrics.roi,
            max_drawdown_pct = metrics.max_drawdown_pct,
            "Replay complete"
        );

        Ok(BacktestResults {
            trades,
            final_state: state,
            metrics,
            skipped,
            rounds_seen,
            busted,
            config: self.config.clone(),
        })
    }

    /// Decides, sizes and settles one round against the current state.
    fn evaluate(
        &self,
        round: &RoundRecord,
        state: &SimulationState,
        mode: TradingMode,
    ) -> Result<Trade, SkipReason> {
        if !round.is_resolved() {
            return Err(SkipReason::Unresolved);
        }
        if round.total_pool() == 0 {
            return Err(SkipReason::EmptyPool);
        }
        // No momentum reading at lock; neither strategy may trade the round.
        if round.momentum_signal == MomentumSignal::Neutral {
            return Err(SkipReason::NoSignal);
        }

        let signal = self
            .source_for(mode)
            .generate(round, state)
            .ok_or(SkipReason::NoSignal)?;

        let payout = round
            .winner_payout_multiple
            .filter(|m| m.is_finite() && *m > 0.0)
            .ok_or(SkipReason::MissingPayout)?;

        let stake_fraction = self.sizer.size(state, round, mode);
        let stake_amount = self.sizer.stake_amount(stake_fraction, state.bankroll);

        let won = signal.direction.wins_against(round.winner);
        let (realized_payout_multiple, profit) = if won {
            (payout, stake_amount * (payout - 1.0))
        } else {
            (0.0, -stake_amount)
        };

        Ok(Trade {
            epoch: round.epoch,
            lock_timestamp: round.lock_timestamp,
            signal: signal.direction,
            implied_payout: signal.implied_payout,
            signal_metadata: signal.metadata,
            stake_fraction,
            stake_amount,
            mode,
            won,
            realized_payout_multiple,
            profit,
            bankroll_after: state.bankroll + profit,
        })
    }

    fn source_for(&self, mode: TradingMode) -> &dyn SignalSource {
        match mode {
            TradingMode::Normal => self.normal.as_ref(),
            TradingMode::Cooldown => self.fallback.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prediction_replay_core::{Direction, Signal, Winner};

    const ONE_BNB: u128 = 1_000_000_000_000_000_000;

    /// Always bets the given direction; records nothing.
    struct Always(Direction);

    impl SignalSource for Always {
        fn generate(&self, _round: &RoundRecord, _state: &SimulationState) -> Option<Signal> {
            Some(Signal::new(self.0, None))
        }

        fn name(&self) -> &str {
            "always"
        }
    }

    fn round(epoch: u64, ts: i64, winner: Winner) -> RoundRecord {
        RoundRecord::new(epoch, ts, 60 * ONE_BNB, 40 * ONE_BNB, winner)
            .with_momentum(MomentumSignal::Bear, 0.05)
            .with_payout_multiple(1.617)
    }

    fn always_engine(config: BacktestConfig, direction: Direction) -> ReplayEngine {
        ReplayEngine::with_sources(config, Box::new(Always(direction)), Box::new(Always(direction)))
            .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = BacktestConfig::default().with_base_position_fraction(-1.0);
        assert!(matches!(
            ReplayEngine::new(config),
            Err(ReplayError::Config(_))
        ));
    }

    #[test]
    fn single_losing_round_matches_worked_example() {
        let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
        let results = engine.run(&[round(1, 1_000, Winner::Up)]).unwrap();

        assert_eq!(results.trades.len(), 1);
        let trade = &results.trades[0];
        assert_eq!(trade.signal, Direction::Bear);
        assert!(!trade.won);
        assert!((trade.stake_amount - 0.045).abs() < 1e-12);
        assert!((trade.profit + 0.045).abs() < 1e-12);
        assert!((trade.bankroll_after - 0.955).abs() < 1e-12);
    }

    #[test]
    fn trade_carries_implied_payout_and_indicators() {
        let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
        let results = engine.run(&[round(1, 1_000, Winner::Up)]).unwrap();
        let trade = &results.trades[0];

        assert!((trade.implied_payout.unwrap() - 2.425).abs() < 1e-9);
        assert!((trade.signal_metadata["bull_payout"] - 1.616_666_666_7).abs() < 1e-9);
        assert!((trade.signal_metadata["momentum_gap"] - 0.05).abs() < 1e-12);

        let json = serde_json::to_string(&results).unwrap();
        assert!(json.contains("\"implied_payout\":2.42"));
        assert!(json.contains("\"bull_payout\""));
    }

    #[test]
    fn winning_round_pays_multiple_minus_stake() {
        let engine = always_engine(BacktestConfig::default(), Direction::Bull);
        let results = engine.run(&[round(1, 1_000, Winner::Up)]).unwrap();
        let trade = &results.trades[0];
        assert!(trade.won);
        assert!((trade.realized_payout_multiple - 1.617).abs() < 1e-12);
        assert!((trade.profit - 0.045 * 0.617).abs() < 1e-12);
    }

    #[test]
    fn skips_are_counted_by_reason() {
        let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
        let mut missing_payout = round(4, 400, Winner::Down);
        missing_payout.winner_payout_multiple = None;
        let rounds = vec![
            round(1, 100, Winner::Draw),
            RoundRecord::new(2, 200, 0, 0, Winner::Up).with_momentum(MomentumSignal::Bull, 0.3),
            round(3, 300, Winner::Up).with_momentum(MomentumSignal::Neutral, 0.0),
            missing_payout,
        ];
        let results = engine.run(&rounds).unwrap();

        assert!(results.trades.is_empty());
        assert_eq!(
            results.skipped,
            SkipCounts {
                unresolved: 1,
                empty_pool: 1,
                no_signal: 1,
                missing_payout: 1,
            }
        );
        assert_eq!(results.rounds_seen, 4);
        assert!((results.final_state.bankroll - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_order_round_aborts() {
        let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
        let rounds = vec![round(1, 500, Winner::Up), round(2, 400, Winner::Up)];
        assert_eq!(
            engine.run(&rounds).unwrap_err(),
            ReplayError::OutOfOrder {
                epoch: 2,
                lock_timestamp: 400,
                previous_timestamp: 500,
            }
        );
    }

    #[test]
    fn equal_timestamps_are_allowed() {
        let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
        let rounds = vec![round(1, 500, Winner::Up), round(2, 500, Winner::Up)];
        assert_eq!(engine.run(&rounds).unwrap().trades.len(), 2);
    }

    #[test]
    fn bust_stops_replay() {
        let config = BacktestConfig::default().with_base_position_fraction(1.0);
        let engine = always_engine(config, Direction::Bear);
        let rounds: Vec<_> = (0..5).map(|i| round(i, i as i64 * 300, Winner::Up)).collect();
        let results = engine.run(&rounds).unwrap();

        assert!(results.busted);
        assert_eq!(results.trades.len(), 1);
        assert_eq!(results.rounds_seen, 1);
        assert!(results.trades[0].bankroll_after <= 0.0);
        assert!(results.metrics.busted);
    }

    #[test]
    fn neutral_rounds_skip_even_with_custom_sources() {
        let engine = always_engine(BacktestConfig::default(), Direction::Bull);
        let rounds = vec![round(1, 100, Winner::Up).with_momentum(MomentumSignal::Neutral, 0.0)];
        let results = engine.run(&rounds).unwrap();
        assert!(results.trades.is_empty());
        assert_eq!(results.skipped.no_signal, 1);
    }

    #[test]
    fn fill_rate_over_rounds_seen() {
        let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
        let rounds = vec![round(1, 100, Winner::Up), round(2, 200, Winner::Draw)];
        let results = engine.run(&rounds).unwrap();
        assert!((results.fill_rate() - 0.5).abs() < f64::EPSILON);
    }
}
