//! Configuration validation errors.

use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a backtest configuration is rejected before any round is replayed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// A value that must be strictly positive is not (includes NaN).
    #[error("{name} must be positive, got {value}")]
    NonPositive {
        /// Config field name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Base stake fraction must lie in (0, 1].
    #[error("base_position_fraction must be in (0, 1], got {0}")]
    FractionOutOfRange(f64),

    /// Circuit breaker would never arm.
    #[error("loss_threshold must be at least 1")]
    ZeroLossThreshold,

    /// House fee must leave something for the winners.
    #[error("house_fee must be in [0, 1), got {0}")]
    HouseFeeOutOfRange(Decimal),

    /// Band thresholds must be ordered.
    #[error("band_lower_threshold ({lower}) must be below band_upper_threshold ({upper})")]
    InvalidBandThresholds {
        /// Oversold threshold.
        lower: f64,
        /// Overbought threshold.
        upper: f64,
    },

    /// An indicator window is too short to compute anything.
    #[error("{name} must be at least {min}, got {value}")]
    WindowTooShort {
        /// Config field name.
        name: &'static str,
        /// Configured window length.
        value: usize,
        /// Minimum accepted length.
        min: usize,
    },
}
