//! Relative Strength Index.
//!
//! Gains and losses of close-to-close deltas are each averaged with a simple
//! rolling mean over `period` deltas, RS = avg_gain / avg_loss and
//! RSI = 100 - 100 / (1 + RS). A window without losses is undefined rather
//! than pinned at 100.
//! Lookback: period (the first bar has no delta).

use super::{rolling_mean, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut gains = vec![f64::NAN; n];
        let mut losses = vec![f64::NAN; n];
        for i in 1..n {
            let delta = bars[i].close - bars[i - 1].close;
            gains[i] = delta.max(0.0);
            losses[i] = (-delta).max(0.0);
        }

        let avg_gain = rolling_mean(&gains, self.period);
        let avg_loss = rolling_mean(&losses, self.period);

        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&g, &l)| {
                if l == 0.0 || l.is_nan() || g.is_nan() {
                    f64::NAN
                } else {
                    100.0 - 100.0 / (1.0 + g / l)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn rsi_known_values() {
        // deltas: +2, -1, +2, -1
        let bars = make_bars(&[10.0, 12.0, 11.0, 13.0, 12.0]);
        let result = Rsi::new(4).compute(&bars);
        for v in result.iter().take(4) {
            assert!(v.is_nan());
        }
        // avg_gain = 1.0, avg_loss = 0.5, RS = 2 → 66.666…
        assert_approx(result[4], 100.0 - 100.0 / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_all_losses_is_zero() {
        let bars = make_bars(&[10.0, 9.0, 8.0, 7.0]);
        let result = Rsi::new(3).compute(&bars);
        assert_approx(result[3], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_without_losses_is_undefined() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let result = Rsi::new(3).compute(&bars);
        assert!(result.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_uses_trailing_window_only() {
        let closes = [10.0, 12.0, 11.0, 13.0, 12.0, 14.0, 13.0];
        let full = Rsi::new(3).compute(&make_bars(&closes));
        let truncated = Rsi::new(3).compute(&make_bars(&closes[..5]));
        for i in 0..5 {
            if full[i].is_nan() {
                assert!(truncated[i].is_nan());
            } else {
                assert_approx(full[i], truncated[i], DEFAULT_EPSILON);
            }
        }
    }
}
