//! Strategies that turn a round into a bet direction.
//!
//! The engine holds exactly two sources and picks one per round from the
//! circuit breaker's mode; sources are never blended.

use rust_decimal::Decimal;

use prediction_replay_core::{BacktestConfig, Direction, RoundRecord, Signal};

use crate::indicators::{percent_b, rate_of_change};
use crate::state::SimulationState;

/// A strategy that may produce a signal for a round.
pub trait SignalSource: Send + Sync {
    /// Returns the side to bet on, or `None` to sit the round out.
    fn generate(&self, round: &RoundRecord, state: &SimulationState) -> Option<Signal>;

    /// Returns the name of this source.
    fn name(&self) -> &str;
}

/// Normal-mode strategy: follow momentum only when the opposite pool is thin
/// enough that the crowd disagrees with it.
///
/// - momentum BULL and bear payout >= threshold -> BULL
/// - momentum BEAR and bull payout >= threshold -> BEAR
#[derive(Debug, Clone, PartialEq)]
pub struct ContrarianSignal {
    house_fee: Decimal,
    min_payout_threshold: f64,
}

impl ContrarianSignal {
    #[must_use]
    pub fn new(house_fee: Decimal, min_payout_threshold: f64) -> Self {
        Self {
            house_fee,
            min_payout_threshold,
        }
    }

    #[must_use]
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self::new(config.house_fee, config.min_payout_threshold)
    }
}

impl SignalSource for ContrarianSignal {
    fn generate(&self, round: &RoundRecord, _state: &SimulationState) -> Option<Signal> {
        let payouts = round.payouts(self.house_fee)?;
        let threshold = self.min_payout_threshold;

        // Follow momentum only while the crowd on the other side is paid enough.
        let direction = round.momentum_signal.direction()?;
        if !payouts.pays(direction.opposite(), threshold) {
            return None;
        }

        let mut signal = Signal::new(direction, payouts.side(direction))
            .with_metadata("momentum_gap", round.momentum_gap);
        if let Some(bull) = payouts.bull {
            signal = signal.with_metadata("bull_payout", bull);
        }
        if let Some(bear) = payouts.bear {
            signal = signal.with_metadata("bear_payout", bear);
        }
        Some(signal)
    }

    fn name(&self) -> &str {
        "contrarian"
    }
}

/// Cooldown-mode strategy: fade Bollinger band extremes when the pool pays
/// enough on the reversal side.
///
/// - percent-b < lower and bull payout >= threshold -> BULL
/// - percent-b > upper and bear payout >= threshold -> BEAR
#[derive(Debug, Clone, PartialEq)]
pub struct MeanReversionSignal {
    house_fee: Decimal,
    min_payout_threshold: f64,
    band_period: usize,
    band_std_dev: f64,
    lower_threshold: f64,
    upper_threshold: f64,
    momentum_period: usize,
    max_momentum_pct: Option<f64>,
}

impl MeanReversionSignal {
    #[must_use]
    pub fn from_config(config: &BacktestConfig) -> Self {
        Self {
            house_fee: config.house_fee,
            min_payout_threshold: config.min_payout_threshold,
            band_period: config.band_period,
            band_std_dev: config.band_std_dev,
            lower_threshold: config.band_lower_threshold,
            upper_threshold: config.band_upper_threshold,
            momentum_period: config.reversion_momentum_period,
            max_momentum_pct: config.reversion_max_momentum_pct,
        }
    }
}

impl SignalSource for MeanReversionSignal {
    fn generate(&self, round: &RoundRecord, _state: &SimulationState) -> Option<Signal> {
        let closes = &round.close_price_path;
        let position = percent_b(closes, self.band_period, self.band_std_dev)?;
        let momentum = rate_of_change(closes, self.momentum_period);

        if let Some(max) = self.max_momentum_pct {
            // Refuse to fade a move we cannot measure or one that is too strong.
            if momentum.map_or(true, |roc| roc.abs() > max) {
                return None;
            }
        }

        let payouts = round.payouts(self.house_fee)?;
        let threshold = self.min_payout_threshold;
        let (direction, payout) = if position < self.lower_threshold
            && payouts.bull_pays(threshold)
        {
            (Direction::Bull, payouts.bull)
        } else if position > self.upper_threshold && payouts.bear_pays(threshold) {
            (Direction::Bear, payouts.bear)
        } else {
            return None;
        };

        let mut signal = Signal::new(direction, payout).with_metadata("percent_b", position);
        if let Some(roc) = momentum {
            signal = signal.with_metadata("rate_of_change", roc);
        }
        Some(signal)
    }

    fn name(&self) -> &str {
        "mean_reversion"
    }
}
