//! Momentum annotation from an external price feed.
//!
//! Each round gets a fast/slow EMA crossover reading taken from candles that
//! closed at or before its lock time, plus the trailing closes used by the
//! fallback strategy. Nothing after the lock is ever read.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use prediction_replay_core::{MomentumSignal, RoundRecord};

use crate::indicators::Ema;

/// One closed candle of the external price feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceCandle {
    /// Unix seconds at which the candle closed.
    pub timestamp: i64,
    pub close: f64,
}

/// EMA crossover parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumParams {
    pub fast: usize,
    pub slow: usize,
    /// |gap| below this percentage is NEUTRAL.
    pub neutral_gap_pct: f64,
    /// Closes copied into `close_price_path`.
    pub path_len: usize,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            neutral_gap_pct: 0.05,
            path_len: 12,
        }
    }
}

impl MomentumParams {
    /// # Errors
    /// Returns error if the windows are empty or not fast < slow
    pub fn validate(&self) -> Result<()> {
        ensure!(self.fast > 0, "fast window must be positive");
        ensure!(
            self.fast < self.slow,
            "fast window ({}) must be shorter than slow window ({})",
            self.fast,
            self.slow
        );
        ensure!(
            self.neutral_gap_pct >= 0.0,
            "neutral gap must be non-negative, got {}",
            self.neutral_gap_pct
        );
        Ok(())
    }
}

/// Classifies a gap (percent of price) against the neutral band.
#[must_use]
pub fn classify_gap(gap: f64, neutral_gap_pct: f64) -> MomentumSignal {
    if !gap.is_finite() || gap.abs() < neutral_gap_pct {
        MomentumSignal::Neutral
    } else if gap > 0.0 {
        MomentumSignal::Bull
    } else {
        MomentumSignal::Bear
    }
}

/// Fills `momentum_signal`, `momentum_gap` and `close_price_path` on each
/// round. Candles must be in ascending timestamp order.
///
/// Rounds before the slow EMA has warmed up are marked NEUTRAL with a zero
/// gap. Returns the number of rounds given a directional signal.
///
/// # Errors
/// Returns error if `params` is invalid or candles are out of order
pub fn annotate_momentum(
    rounds: &mut [RoundRecord],
    candles: &[PriceCandle],
    params: &MomentumParams,
) -> Result<usize> {
    params.validate()?;
    ensure!(
        candles.windows(2).all(|w| w[0].timestamp <= w[1].timestamp),
        "candles must be sorted by timestamp"
    );

    let mut fast = Ema::new(params.fast);
    let mut slow = Ema::new(params.slow);
    let mut consumed = 0usize;
    let mut last_lock = i64::MIN;
    let mut directional = 0usize;

    for round in rounds.iter_mut() {
        if round.lock_timestamp < last_lock {
            // Rounds went backwards; rebuild the averages from scratch.
            fast = Ema::new(params.fast);
            slow = Ema::new(params.slow);
            consumed = 0;
        }
        last_lock = round.lock_timestamp;

        while consumed < candles.len() && candles[consumed].timestamp <= round.lock_timestamp {
            let close = candles[consumed].close;
            fast.update(close);
            slow.update(close);
            consumed += 1;
        }

        let gap = match (fast.value(), slow.value()) {
            (Some(f), Some(s)) if slow.is_warm() && s != 0.0 => (f - s) / s * 100.0,
            _ => 0.0,
        };
        let signal = if slow.is_warm() {
            classify_gap(gap, params.neutral_gap_pct)
        } else {
            MomentumSignal::Neutral
        };
        if signal != MomentumSignal::Neutral {
            directional += 1;
        }

        round.momentum_signal = signal;
        round.momentum_gap = gap;
        round.close_price_path = candles[consumed.saturating_sub(params.path_len)..consumed]
            .iter()
            .map(|c| c.close)
            .collect();
    }

    debug!(
        rounds = rounds.len(),
        directional, "Annotated rounds with momentum"
    );
    Ok(directional)
}
