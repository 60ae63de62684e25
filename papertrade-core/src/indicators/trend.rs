//! Trend strength: |SMA(fast) - SMA(slow)| / SMA(slow).
//!
//! Undefined when the slow average is zero.
//! Lookback: slow - 1.

use super::{rolling_mean, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct TrendStrength {
    fast: usize,
    slow: usize,
    name: String,
}

impl TrendStrength {
    pub fn new(fast: usize, slow: usize) -> Self {
        assert!(fast >= 1 && slow >= 1, "trend windows must be >= 1");
        Self {
            fast,
            slow,
            name: format!("trend_strength_{fast}_{slow}"),
        }
    }
}

impl Indicator for TrendStrength {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.fast.max(self.slow).saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let fast = rolling_mean(&closes, self.fast);
        let slow = rolling_mean(&closes, self.slow);
        fast.iter()
            .zip(&slow)
            .map(|(&f, &s)| if s == 0.0 { f64::NAN } else { (f - s).abs() / s })
            .collect()
    }
}
