//! Historical round records for binary UP/DOWN prediction markets.
//!
//! A round is read once from an external source and never mutated by the
//! replay engine. Pool amounts are kept as raw wei (`u128`) so that payout
//! ratios can be computed without floating-point drift.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pool::{payout_multiple, PoolPayouts};

/// Settled result of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Winner {
    /// Lock price was below close price.
    Up,
    /// Lock price was above close price.
    Down,
    /// Lock and close price were equal; house takes the pool.
    Draw,
    /// Round was never settled or the oracle result is missing.
    Unknown,
}

impl Winner {
    /// Returns the direction that won, if the round is tradeable.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Up => Some(Direction::Bull),
            Self::Down => Some(Direction::Bear),
            Self::Draw | Self::Unknown => None,
        }
    }
}

impl FromStr for Winner {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "UP" | "BULL" => Ok(Self::Up),
            "DOWN" | "BEAR" => Ok(Self::Down),
            "DRAW" | "HOUSE" => Ok(Self::Draw),
            "UNKNOWN" | "" => Ok(Self::Unknown),
            other => Err(anyhow!("unknown winner '{other}'")),
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Draw => "DRAW",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Direction of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Bet on the UP side.
    Bull,
    /// Bet on the DOWN side.
    Bear,
}

impl Direction {
    /// Returns the opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Bull => Self::Bear,
            Self::Bear => Self::Bull,
        }
    }

    /// Returns true if a bet in this direction wins against `winner`.
    #[must_use]
    pub fn wins_against(self, winner: Winner) -> bool {
        winner.direction() == Some(self)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bull => f.write_str("BULL"),
            Self::Bear => f.write_str("BEAR"),
        }
    }
}

/// Momentum classification from a fast/slow EMA crossover on an external
/// price feed, sampled at the round's lock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MomentumSignal {
    Bull,
    Bear,
    #[default]
    Neutral,
}

impl MomentumSignal {
    /// Returns the implied direction, or `None` for `Neutral`.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Bull => Some(Direction::Bull),
            Self::Bear => Some(Direction::Bear),
            Self::Neutral => None,
        }
    }
}

impl FromStr for MomentumSignal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "BULL" | "UP" => Ok(Self::Bull),
            "BEAR" | "DOWN" => Ok(Self::Bear),
            "NEUTRAL" | "" => Ok(Self::Neutral),
            other => Err(anyhow!("unknown momentum signal '{other}'")),
        }
    }
}

impl fmt::Display for MomentumSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bull => "BULL",
            Self::Bear => "BEAR",
            Self::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// One historical betting round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Monotonically increasing round identifier.
    pub epoch: u64,
    /// Unix seconds at which the entry window closed.
    pub lock_timestamp: i64,
    /// Final amount staked on UP, in wei.
    pub pool_bull_amount: u128,
    /// Final amount staked on DOWN, in wei.
    pub pool_bear_amount: u128,
    /// Settled result.
    pub winner: Winner,
    /// Realized payout multiple for the winning side. Only meaningful when
    /// `winner` is `Up` or `Down`.
    pub winner_payout_multiple: Option<f64>,
    /// EMA crossover classification at lock time.
    pub momentum_signal: MomentumSignal,
    /// Signed EMA separation as a percentage of price.
    pub momentum_gap: f64,
    /// Trailing closes ending at this round, oldest first.
    #[serde(default)]
    pub close_price_path: Vec<f64>,
}

impl RoundRecord {
    /// Creates a round with no momentum data and no price path.
    #[must_use]
    pub fn new(
        epoch: u64,
        lock_timestamp: i64,
        pool_bull_amount: u128,
        pool_bear_amount: u128,
        winner: Winner,
    ) -> Self {
        Self {
            epoch,
            lock_timestamp,
            pool_bull_amount,
            pool_bear_amount,
            winner,
            winner_payout_multiple: None,
            momentum_signal: MomentumSignal::Neutral,
            momentum_gap: 0.0,
            close_price_path: Vec::new(),
        }
    }

    /// Sets the momentum classification and gap.
    #[must_use]
    pub fn with_momentum(mut self, signal: MomentumSignal, gap: f64) -> Self {
        self.momentum_signal = signal;
        self.momentum_gap = gap;
        self
    }

    /// Sets the realized payout multiple of the winning side.
    #[must_use]
    pub fn with_payout_multiple(mut self, multiple: f64) -> Self {
        self.winner_payout_multiple = Some(multiple);
        self
    }

    /// Sets the trailing close price window.
    #[must_use]
    pub fn with_close_path(mut self, closes: Vec<f64>) -> Self {
        self.close_price_path = closes;
        self
    }

    /// Total staked across both sides, in wei.
    ///
    /// Saturates rather than wrapping; a pool anywhere near `u128::MAX` wei
    /// is not a real market.
    #[must_use]
    pub fn total_pool(&self) -> u128 {
        self.pool_bull_amount.saturating_add(self.pool_bear_amount)
    }

    /// Returns true if the round settled to a tradeable side.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.winner.direction().is_some()
    }

    /// Lock time as a UTC timestamp, if representable.
    #[must_use]
    pub fn lock_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.lock_timestamp, 0)
    }

    /// Implied payout multiples for both sides after the house fee.
    ///
    /// Returns `None` when the round has no stake at all.
    #[must_use]
    pub fn payouts(&self, house_fee: Decimal) -> Option<PoolPayouts> {
        PoolPayouts::from_pools(self.pool_bull_amount, self.pool_bear_amount, house_fee)
    }

    /// Computes the settled payout multiple of the winning side from the pools.
    ///
    /// Useful for sources that store pools but not the on-chain reward amount.
    #[must_use]
    pub fn derive_winner_payout(&self, house_fee: Decimal) -> Option<f64> {
        let side = match self.winner.direction()? {
            Direction::Bull => self.pool_bull_amount,
            Direction::Bear => self.pool_bear_amount,
        };
        payout_multiple(self.total_pool(), side, house_fee).and_then(|d| f64::try_from(d).ok())
    }
}
