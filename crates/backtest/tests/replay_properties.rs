//! Integration tests for the replay engine.
//!
//! These tests drive full runs through `ReplayEngine` and check:
//! - Worked example on a single round
//! - Determinism of repeated runs
//! - Causal ordering and bankroll floor
//! - Circuit breaker trigger, cooldown routing and release
//! - Sizing composition under strong momentum after two losses
//! - CSV load -> replay -> ledger export

use prediction_replay_backtest::{
    write_rounds_csv, write_trades_csv, ReplayEngine, ReplayError, RoundCsvProvider,
    SignalSource, SimulationState,
};
use prediction_replay_core::{
    BacktestConfig, Direction, MomentumSignal, RoundRecord, Signal, TradingMode, Winner,
};
use rust_decimal_macros::dec;
use tempfile::tempdir;

const ONE_BNB: u128 = 1_000_000_000_000_000_000;

// =============================================================================
// Helper Functions
// =============================================================================

/// Bets the same side every round, in either mode.
struct FixedSide(Direction);

impl SignalSource for FixedSide {
    fn generate(&self, _round: &RoundRecord, _state: &SimulationState) -> Option<Signal> {
        Some(Signal::new(self.0, None))
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn fixed_engine(config: BacktestConfig, side: Direction) -> ReplayEngine {
    ReplayEngine::with_sources(config, Box::new(FixedSide(side)), Box::new(FixedSide(side)))
        .unwrap()
}

/// 60/40 pool with BEAR momentum: the contrarian rule bets BEAR.
fn contrarian_round(epoch: u64, ts: i64, winner: Winner) -> RoundRecord {
    RoundRecord::new(epoch, ts, 60 * ONE_BNB, 40 * ONE_BNB, winner)
        .with_momentum(MomentumSignal::Bear, -0.05)
        .with_payout_multiple(1.617)
}

/// A mixed history with every kind of round the engine can see.
fn mixed_history() -> Vec<RoundRecord> {
    let mut rounds = Vec::new();
    for i in 0..60u64 {
        let ts = i as i64 * 300;
        let winner = match i % 7 {
            0 => Winner::Draw,
            1 | 3 | 4 => Winner::Up,
            _ => Winner::Down,
        };
        let momentum = match i % 5 {
            0 => MomentumSignal::Neutral,
            1 | 2 => MomentumSignal::Bull,
            _ => MomentumSignal::Bear,
        };
        let bull = (20 + (i * 13) % 70) as u128 * ONE_BNB;
        let bear = (15 + (i * 29) % 75) as u128 * ONE_BNB;
        let mut round = RoundRecord::new(i, ts, bull, bear, winner)
            .with_momentum(momentum, (i % 9) as f64 * 0.05 - 0.2)
            .with_close_path(
                (0..10)
                    .map(|k| 100.0 + ((i + k) % 6) as f64 - if k == 9 { 4.0 } else { 0.0 })
                    .collect(),
            );
        round.winner_payout_multiple = round.derive_winner_payout(dec!(0.03));
        rounds.push(round);
    }
    rounds
}

// =============================================================================
// Worked example
// =============================================================================

#[test]
fn single_bear_bet_on_up_round_loses_base_stake() {
    let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
    let results = engine.run(&[contrarian_round(1, 1_000, Winner::Up)]).unwrap();

    assert_eq!(results.trades.len(), 1);
    let trade = &results.trades[0];
    assert_eq!(trade.signal, Direction::Bear);
    assert_eq!(trade.mode, TradingMode::Normal);
    assert!(!trade.won);
    assert!((trade.stake_fraction - 0.045).abs() < 1e-12);
    assert!((trade.profit + 0.045).abs() < 1e-12);
    assert!((trade.bankroll_after - 0.955).abs() < 1e-12);
    assert!((results.final_state.bankroll - 0.955).abs() < 1e-12);
}

#[test]
fn neutral_rounds_never_reach_the_ledger() {
    let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
    let rounds = mixed_history();
    let results = engine.run(&rounds).unwrap();

    assert!(!results.trades.is_empty());
    for trade in &results.trades {
        let round = rounds.iter().find(|r| r.epoch == trade.epoch).unwrap();
        assert_ne!(round.momentum_signal, MomentumSignal::Neutral);
    }
    assert!(results.skipped.no_signal > 0);
    assert!(results.skipped.unresolved > 0);
}

#[test]
fn running_streaks_agree_with_ledger_metrics() {
    let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
    let results = engine.run(&mixed_history()).unwrap();
    let streaks = &results.final_state.streaks;

    assert!(results.trades.len() > 1);
    assert_eq!(streaks.longest_wins, results.metrics.max_consecutive_wins);
    assert_eq!(streaks.longest_losses, results.metrics.max_consecutive_losses);

    let last_won = results.trades.last().unwrap().won;
    assert_eq!(streaks.current_wins > 0, last_won);
    assert_eq!(streaks.current_losses > 0, !last_won);
}

// =============================================================================
// Determinism and ordering
// =============================================================================

#[test]
fn repeated_runs_are_byte_identical() {
    let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
    let rounds = mixed_history();

    let first = serde_json::to_string(&engine.run(&rounds).unwrap()).unwrap();
    let second = serde_json::to_string(&engine.run(&rounds).unwrap()).unwrap();
    assert_eq!(first, second);

    let fresh = ReplayEngine::new(BacktestConfig::default()).unwrap();
    let third = serde_json::to_string(&fresh.run(&rounds).unwrap()).unwrap();
    assert_eq!(first, third);
}

#[test]
fn backwards_round_fails_the_whole_run() {
    let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
    let mut rounds = mixed_history();
    rounds.swap(10, 11);

    let err = engine.run(&rounds).unwrap_err();
    assert!(matches!(err, ReplayError::OutOfOrder { epoch: 10, .. }));
}

#[test]
fn bankroll_never_goes_negative() {
    let config = BacktestConfig::default()
        .with_base_position_fraction(0.5)
        .with_recovery_multiplier(3.0);
    let engine = fixed_engine(config, Direction::Bear);
    let rounds: Vec<_> = (0..40)
        .map(|i| contrarian_round(i, i as i64 * 300, Winner::Up))
        .collect();
    let results = engine.run(&rounds).unwrap();

    let mut bankroll = 1.0;
    for trade in &results.trades {
        assert!(trade.stake_amount <= bankroll + 1e-12);
        assert!(trade.bankroll_after >= 0.0);
        bankroll = trade.bankroll_after;
    }
}

#[test]
fn bust_truncates_the_ledger() {
    let config = BacktestConfig::default().with_base_position_fraction(1.0);
    let engine = fixed_engine(config, Direction::Bear);
    let rounds: Vec<_> = (0..10)
        .map(|i| contrarian_round(i, i as i64 * 300, Winner::Up))
        .collect();
    let results = engine.run(&rounds).unwrap();

    assert!(results.busted);
    assert_eq!(results.trades.len(), 1);
    assert!(results.final_state.is_bust());
}

// =============================================================================
// Circuit breaker
// =============================================================================

#[test]
fn third_loss_routes_next_round_to_fallback() {
    let config = BacktestConfig::default().with_circuit_breaker(3, 1_000);
    let engine = fixed_engine(config, Direction::Bear);
    let rounds = vec![
        contrarian_round(1, 0, Winner::Up),
        contrarian_round(2, 100, Winner::Up),
        contrarian_round(3, 200, Winner::Up),
        contrarian_round(4, 300, Winner::Up),
        contrarian_round(5, 1_199, Winner::Up),
        contrarian_round(6, 1_200, Winner::Up),
    ];
    let results = engine.run(&rounds).unwrap();
    let modes: Vec<_> = results.trades.iter().map(|t| t.mode).collect();

    assert_eq!(
        modes,
        vec![
            TradingMode::Normal,
            TradingMode::Normal,
            TradingMode::Normal,
            TradingMode::Cooldown,
            TradingMode::Cooldown,
            TradingMode::Normal,
        ]
    );
    let tripped = engine.run(&rounds[..3]).unwrap();
    assert_eq!(tripped.final_state.risk.cooldown_until_timestamp, Some(200 + 1_000));

    // Cooldown losses did not count; only the post-release loss did.
    assert_eq!(results.final_state.risk.consecutive_losses, 1);
    assert!(!results.final_state.risk.in_cooldown());
}

#[test]
fn cooldown_uses_mean_reversion_with_recovery_sizing() {
    let config = BacktestConfig::default().with_circuit_breaker(3, 3_600);
    let engine = ReplayEngine::new(config).unwrap();
    let oversold = vec![100.0, 100.5, 101.0, 100.8, 101.2, 100.9, 101.1, 95.0];
    let rounds = vec![
        contrarian_round(1, 0, Winner::Up),
        contrarian_round(2, 300, Winner::Up),
        contrarian_round(3, 600, Winner::Up),
        RoundRecord::new(4, 900, 30 * ONE_BNB, 70 * ONE_BNB, Winner::Up)
            .with_momentum(MomentumSignal::Bear, -0.05)
            .with_payout_multiple(3.233)
            .with_close_path(oversold),
        contrarian_round(5, 4_200, Winner::Down),
    ];
    let results = engine.run(&rounds).unwrap();

    assert_eq!(results.trades.len(), 5);
    let fallback = &results.trades[3];
    assert_eq!(fallback.mode, TradingMode::Cooldown);
    assert_eq!(fallback.signal, Direction::Bull);
    assert!(fallback.won);
    assert!((fallback.stake_fraction - 0.045 * 1.5).abs() < 1e-12);

    let released = &results.trades[4];
    assert_eq!(released.mode, TradingMode::Normal);
    assert!(released.won);
    assert_eq!(results.metrics.cooldown.trades, 1);
    assert_eq!(results.metrics.normal.trades, 4);
}

// =============================================================================
// Sizing
// =============================================================================

#[test]
fn strong_momentum_after_two_losses_compounds_multipliers() {
    let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
    let rounds = vec![
        contrarian_round(1, 0, Winner::Up),
        contrarian_round(2, 300, Winner::Up),
        contrarian_round(3, 600, Winner::Down).with_momentum(MomentumSignal::Bear, -0.5),
    ];
    let results = engine.run(&rounds).unwrap();

    assert_eq!(results.trades.len(), 3);
    let expected = 0.045 * 1.5 * 1.5;
    assert!((results.trades[2].stake_fraction - expected).abs() < 1e-12);
    assert!(results.trades[2].won);
}

#[test]
fn bankroll_cap_limits_stake_after_growth() {
    let config = BacktestConfig::default()
        .with_base_position_fraction(0.5)
        .with_bankroll_cap(Some(1.0));
    let engine = fixed_engine(config, Direction::Bull);
    let rounds: Vec<_> = (0..3)
        .map(|i| contrarian_round(i, i as i64 * 300, Winner::Up).with_payout_multiple(3.0))
        .collect();
    let results = engine.run(&rounds).unwrap();

    // 1.0 -> 2.0 -> 3.0 -> 4.0: stake stays 0.5 of the 1.0 cap.
    for trade in &results.trades {
        assert!((trade.stake_amount - 0.5).abs() < 1e-12);
    }
    assert!((results.final_state.bankroll - 4.0).abs() < 1e-12);
}

// =============================================================================
// CSV end to end
// =============================================================================

#[test]
fn csv_history_replays_like_in_memory_history() {
    let dir = tempdir().unwrap();
    let rounds_path = dir.path().join("rounds.csv");
    let trades_path = dir.path().join("trades.csv");
    let rounds = mixed_history();

    write_rounds_csv(&rounds_path, &rounds).unwrap();
    let loaded = RoundCsvProvider::from_csv(&rounds_path).unwrap();
    assert_eq!(loaded.len(), rounds.len());

    let engine = ReplayEngine::new(BacktestConfig::default()).unwrap();
    let from_memory = engine.run(&rounds).unwrap();
    let from_csv = engine.run(loaded.rounds()).unwrap();
    assert_eq!(from_memory.trades, from_csv.trades);

    write_trades_csv(&trades_path, &from_csv.trades).unwrap();
    let contents = std::fs::read_to_string(&trades_path).unwrap();
    assert!(contents.starts_with("epoch,lock_timestamp,signal"));
    assert_eq!(contents.lines().count(), from_csv.trades.len() + 1);
}
