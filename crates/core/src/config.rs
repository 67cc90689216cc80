use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Strategy and simulation parameters for one replay run.
///
/// Every field has a default, so partial TOML files and env overrides only
/// need to name what they change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Fraction of the pool kept by the house before payouts.
    pub house_fee: Decimal,
    /// Minimum implied payout required to take a trade.
    pub min_payout_threshold: f64,
    /// Baseline stake as a fraction of bankroll.
    pub base_position_fraction: f64,
    /// `|momentum_gap|` at or above this is a strong signal.
    pub momentum_gap_threshold: f64,
    /// Stake boost on strong momentum (normal mode only).
    pub momentum_multiplier: f64,
    /// Stake boost after two consecutive losses.
    pub recovery_multiplier: f64,
    /// Consecutive normal-mode losses that trip the circuit breaker.
    pub loss_threshold: u32,
    /// How long the fallback strategy stays in charge once tripped.
    pub cooldown_duration_seconds: i64,
    /// Ceiling on the bankroll used for sizing.
    pub bankroll_cap: Option<f64>,
    /// Initial capital.
    pub starting_bankroll: f64,
    /// Bollinger window (rounds) for the fallback strategy.
    pub band_period: usize,
    /// Band width in standard deviations.
    pub band_std_dev: f64,
    /// Percent-b below this is oversold.
    pub band_lower_threshold: f64,
    /// Percent-b above this is overbought.
    pub band_upper_threshold: f64,
    /// Lookback (rounds) for the fallback rate-of-change indicator.
    pub reversion_momentum_period: usize,
    /// Skip reversion trades when `|rate of change|` exceeds this percentage.
    pub reversion_max_momentum_pct: Option<f64>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            house_fee: dec!(0.03),
            min_payout_threshold: 1.45,
            base_position_fraction: 0.045,
            momentum_gap_threshold: 0.15,
            momentum_multiplier: 1.5,
            recovery_multiplier: 1.5,
            loss_threshold: 3,
            cooldown_duration_seconds: 2 * 60 * 60,
            bankroll_cap: None,
            starting_bankroll: 1.0,
            band_period: 8,
            band_std_dev: 2.0,
            band_lower_threshold: 0.2,
            band_upper_threshold: 0.8,
            reversion_momentum_period: 10,
            reversion_max_momentum_pct: None,
        }
    }
}

impl BacktestConfig {
    /// Checks every parameter the engine depends on.
    ///
    /// # Errors
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.house_fee < Decimal::ZERO || self.house_fee >= Decimal::ONE {
            return Err(ConfigError::HouseFeeOutOfRange(self.house_fee));
        }
        if !(self.base_position_fraction > 0.0 && self.base_position_fraction <= 1.0) {
            return Err(ConfigError::FractionOutOfRange(self.base_position_fraction));
        }
        if self.loss_threshold == 0 {
            return Err(ConfigError::ZeroLossThreshold);
        }

        let positives = [
            ("min_payout_threshold", self.min_payout_threshold),
            ("momentum_multiplier", self.momentum_multiplier),
            ("recovery_multiplier", self.recovery_multiplier),
            ("starting_bankroll", self.starting_bankroll),
            ("band_std_dev", self.band_std_dev),
        ];
        for (name, value) in positives {
            require_positive(name, value)?;
        }
        if let Some(cap) = self.bankroll_cap {
            require_positive("bankroll_cap", cap)?;
        }
        if let Some(max) = self.reversion_max_momentum_pct {
            require_positive("reversion_max_momentum_pct", max)?;
        }
        if self.cooldown_duration_seconds < 0 {
            return Err(ConfigError::NonPositive {
                name: "cooldown_duration_seconds",
                value: self.cooldown_duration_seconds as f64,
            });
        }

        if self.band_period < 2 {
            return Err(ConfigError::WindowTooShort {
                name: "band_period",
                value: self.band_period,
                min: 2,
            });
        }
        if self.reversion_momentum_period < 1 {
            return Err(ConfigError::WindowTooShort {
                name: "reversion_momentum_period",
                value: self.reversion_momentum_period,
                min: 1,
            });
        }
        if !(self.band_lower_threshold < self.band_upper_threshold) {
            return Err(ConfigError::InvalidBandThresholds {
                lower: self.band_lower_threshold,
                upper: self.band_upper_threshold,
            });
        }

        Ok(())
    }

    /// Sets the house fee.
    #[must_use]
    pub fn with_house_fee(mut self, fee: Decimal) -> Self {
        self.house_fee = fee;
        self
    }

    /// Sets the minimum payout threshold.
    #[must_use]
    pub fn with_min_payout_threshold(mut self, threshold: f64) -> Self {
        self.min_payout_threshold = threshold;
        self
    }

    /// Sets the base position fraction.
    #[must_use]
    pub fn with_base_position_fraction(mut self, fraction: f64) -> Self {
        self.base_position_fraction = fraction;
        self
    }

    /// Sets the strong-momentum threshold and multiplier.
    #[must_use]
    pub fn with_momentum_boost(mut self, gap_threshold: f64, multiplier: f64) -> Self {
        self.momentum_gap_threshold = gap_threshold;
        self.momentum_multiplier = multiplier;
        self
    }

    /// Sets the recovery multiplier.
    #[must_use]
    pub fn with_recovery_multiplier(mut self, multiplier: f64) -> Self {
        self.recovery_multiplier = multiplier;
        self
    }

    /// Sets the circuit breaker trigger and duration.
    #[must_use]
    pub fn with_circuit_breaker(mut self, loss_threshold: u32, cooldown_seconds: i64) -> Self {
        self.loss_threshold = loss_threshold;
        self.cooldown_duration_seconds = cooldown_seconds;
        self
    }

    /// Sets the sizing bankroll cap.
    #[must_use]
    pub fn with_bankroll_cap(mut self, cap: Option<f64>) -> Self {
        self.bankroll_cap = cap;
        self
    }

    /// Sets the starting bankroll.
    #[must_use]
    pub fn with_starting_bankroll(mut self, bankroll: f64) -> Self {
        self.starting_bankroll = bankroll;
        self
    }

    /// Sets the fallback band window and thresholds.
    #[must_use]
    pub fn with_band(mut self, period: usize, lower: f64, upper: f64) -> Self {
        self.band_period = period;
        self.band_lower_threshold = lower;
        self.band_upper_threshold = upper;
        self
    }

    /// Sets the fallback trend filter.
    #[must_use]
    pub fn with_reversion_momentum(mut self, period: usize, max_pct: Option<f64>) -> Self {
        self.reversion_momentum_period = period;
        self.reversion_max_momentum_pct = max_pct;
        self
    }
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    // written so NaN fails too
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { name, value })
    }
}
