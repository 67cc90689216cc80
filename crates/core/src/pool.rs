//! Pool payout arithmetic.
//!
//! Payout multiples are computed in fixed-point (`Decimal`) from the raw wei
//! pools and only converted to `f64` once the ratio is known.
//!
//! ```text
//! payout(side) = (bull + bear) * (1 - house_fee) / side
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::round::Direction;

/// Largest mantissa `Decimal` can hold.
const DECIMAL_MANTISSA_BITS: u32 = 96;

/// Implied payout multiple of each side of a round.
///
/// A side with no stake has no defined payout and is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolPayouts {
    pub bull: Option<f64>,
    pub bear: Option<f64>,
}

impl PoolPayouts {
    /// Computes both payouts. Returns `None` if the combined pool is empty.
    #[must_use]
    pub fn from_pools(bull: u128, bear: u128, house_fee: Decimal) -> Option<Self> {
        let total = bull.checked_add(bear)?;
        if total == 0 {
            return None;
        }
        let to_f64 = |side| payout_multiple(total, side, house_fee).and_then(|d| f64::try_from(d).ok());
        Some(Self {
            bull: to_f64(bull),
            bear: to_f64(bear),
        })
    }

    /// Payout of the given side.
    #[must_use]
    pub fn side(&self, direction: Direction) -> Option<f64> {
        match direction {
            Direction::Bull => self.bull,
            Direction::Bear => self.bear,
        }
    }

    /// Returns true if the given side pays at least `threshold`.
    #[must_use]
    pub fn pays(&self, direction: Direction, threshold: f64) -> bool {
        self.side(direction).is_some_and(|p| p >= threshold)
    }

    /// Returns true if the bull side pays at least `threshold`.
    #[must_use]
    pub fn bull_pays(&self, threshold: f64) -> bool {
        self.pays(Direction::Bull, threshold)
    }

    /// Returns true if the bear side pays at least `threshold`.
    #[must_use]
    pub fn bear_pays(&self, threshold: f64) -> bool {
        self.pays(Direction::Bear, threshold)
    }
}

/// Payout multiple for one side of a pool.
///
/// Both amounts are shifted right together when `total` exceeds the decimal
/// mantissa, which keeps the ratio intact. A side that shifts to zero is too
/// thin to price and yields `None`, as does a side with no stake.
#[must_use]
pub fn payout_multiple(total: u128, side: u128, house_fee: Decimal) -> Option<Decimal> {
    if side == 0 || total == 0 || side > total {
        return None;
    }
    let shift = (u128::BITS - total.leading_zeros()).saturating_sub(DECIMAL_MANTISSA_BITS);
    let total = wei_to_decimal(total >> shift)?;
    let side = wei_to_decimal(side >> shift)?;
    if side.is_zero() {
        return None;
    }
    (total * (Decimal::ONE - house_fee)).checked_div(side)
}

fn wei_to_decimal(amount: u128) -> Option<Decimal> {
    let amount = i128::try_from(amount).ok()?;
    Decimal::try_from_i128_with_scale(amount, 0).ok()
}
