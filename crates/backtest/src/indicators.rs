//! Price indicators used by the fallback strategy and momentum annotation.

/// Exponential moving average, seeded with the first observation.
///
/// ```text
/// bar 0  -> value = price
/// bar 1+ -> value = alpha * price + (1 - alpha) * prev,  alpha = 2 / (window + 1)
/// ```
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    value: f64,
    window: usize,
    count: usize,
}

impl Ema {
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            alpha: 2.0 / (window as f64 + 1.0),
            value: 0.0,
            window,
            count: 0,
        }
    }

    /// Feeds one price and returns the updated average.
    pub fn update(&mut self, price: f64) -> f64 {
        if self.count == 0 {
            self.value = price;
        } else {
            self.value = self.alpha * price + (1.0 - self.alpha) * self.value;
        }
        self.count += 1;
        self.value
    }

    /// Current value, or `None` before the first update.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        (self.count > 0).then_some(self.value)
    }

    /// True once `window` prices have been seen.
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.count >= self.window
    }
}

/// Bollinger band position of the latest close over the trailing `period`
/// closes, using population standard deviation.
///
/// 0.0 sits on the lower band, 1.0 on the upper band; values outside [0, 1]
/// are outside the bands. Returns `None` with fewer than `period` closes or
/// when the bands have zero width.
#[must_use]
pub fn percent_b(closes: &[f64], period: usize, num_std: f64) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / period as f64;
    let width = 2.0 * num_std * variance.sqrt();
    if width <= f64::EPSILON * mean.abs().max(1.0) {
        return None;
    }
    let lower = mean - num_std * variance.sqrt();
    let last = *window.last()?;
    Some((last - lower) / width)
}

/// Percent change of the latest close versus the close `lookback` rounds earlier.
#[must_use]
pub fn rate_of_change(closes: &[f64], lookback: usize) -> Option<f64> {
    if closes.len() <= lookback {
        return None;
    }
    let last = *closes.last()?;
    let base = closes[closes.len() - 1 - lookback];
    if base == 0.0 {
        return None;
    }
    Some((last - base) / base * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_seeds_with_first_price() {
        let mut ema = Ema::new(3);
        assert!(ema.value().is_none());
        assert!((ema.update(10.0) - 10.0).abs() < 1e-12);
        // alpha = 0.5
        assert!((ema.update(11.0) - 10.5).abs() < 1e-12);
        assert!((ema.update(12.0) - 11.25).abs() < 1e-12);
        assert!(ema.is_warm());
    }

    #[test]
    fn ema_not_warm_before_window() {
        let mut ema = Ema::new(5);
        for p in [1.0, 2.0, 3.0, 4.0] {
            ema.update(p);
        }
        assert!(!ema.is_warm());
        ema.update(5.0);
        assert!(ema.is_warm());
    }

    #[test]
    fn percent_b_at_mean_is_half() {
        let closes = [1.0, 3.0, 1.0, 3.0, 2.0, 2.0, 1.0, 3.0, 2.0];
        // last 8: 3,1,3,2,2,1,3,2 -> mean 2.125; last 2 is just below mean
        let pb = percent_b(&closes, 8, 2.0).unwrap();
        assert!(pb < 0.5 && pb > 0.4);
    }

    #[test]
    fn percent_b_below_lower_band_is_negative() {
        let mut closes = vec![100.0; 7];
        closes[0] = 101.0;
        closes.push(90.0);
        let pb = percent_b(&closes, 8, 1.0).unwrap();
        assert!(pb < 0.0);
    }

    #[test]
    fn percent_b_requires_full_window() {
        assert!(percent_b(&[1.0, 2.0, 3.0], 8, 2.0).is_none());
    }

    #[test]
    fn percent_b_flat_prices_have_no_band() {
        assert!(percent_b(&[5.0; 10], 8, 2.0).is_none());
    }

    #[test]
    fn rate_of_change_over_lookback() {
        let closes = [100.0, 101.0, 102.0, 110.0];
        let roc = rate_of_change(&closes, 3).unwrap();
        assert!((roc - 10.0).abs() < 1e-12);
        assert!(rate_of_change(&closes, 4).is_none());
    }
}
