//! Pair-Spread Builder for stat-arb mode.
//!
//! Joins two bar series by nearest timestamp, derives a rolling hedge ratio
//! and synthesizes a strictly positive spread series that the indicator
//! engine consumes like any other bar series.

use crate::domain::{clean_bars, Bar};
use crate::error::InputError;
use crate::indicators::rolling_mean;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback join step when neither series has a usable median interval.
pub const DEFAULT_STEP_MS: i64 = 3_600_000;

/// Added on top of |min| when shifting a non-positive spread.
pub const SPREAD_SHIFT_EPSILON: f64 = 1e-8;

/// Spread bar plus the hedge ratio that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairSpreadBar {
    pub bar: Bar,
    pub hedge_ratio: f64,
}

/// Output of [`build_pair_spread`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpreadSeries {
    pub pair_symbol: String,
    pub rows: Vec<PairSpreadBar>,
    /// Constant added to every raw spread close (0 when already positive).
    pub shift: f64,
    /// Join tolerance in milliseconds.
    pub tolerance_ms: i64,
}

impl SpreadSeries {
    pub fn bars(&self) -> Vec<Bar> {
        self.rows.iter().map(|r| r.bar.clone()).collect()
    }

    pub fn hedge_ratio_at(&self, index: usize) -> Option<f64> {
        self.rows.get(index).map(|r| r.hedge_ratio)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Median sampling interval in milliseconds, `None` if undeterminable.
pub fn median_step_ms(bars: &[Bar]) -> Option<i64> {
    let mut deltas: Vec<i64> = bars
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds())
        .collect();
    if deltas.is_empty() {
        return None;
    }
    deltas.sort_unstable();
    let mid = deltas.len() / 2;
    let median = if deltas.len() % 2 == 0 {
        ((deltas[mid - 1] as f64 + deltas[mid] as f64) / 2.0) as i64
    } else {
        deltas[mid]
    };
    (median > 0).then_some(median)
}

/// Index of the nearest timestamp within `tolerance_ms`; ties go to the earlier bar.
pub(crate) fn nearest_within(timestamps: &[DateTime<Utc>], target: DateTime<Utc>, tolerance_ms: i64) -> Option<usize> {
    let forward = timestamps.partition_point(|t| *t < target);
    let backward = timestamps.partition_point(|t| *t <= target).checked_sub(1);

    let dist = |i: usize| (target - timestamps[i]).num_milliseconds().abs();
    let best = match (backward, (forward < timestamps.len()).then_some(forward)) {
        (Some(b), Some(f)) => {
            if dist(f) < dist(b) {
                f
            } else {
                b
            }
        }
        (Some(b), None) => b,
        (None, Some(f)) => f,
        (None, None) => return None,
    };
    (dist(best) <= tolerance_ms).then_some(best)
}

/// Rolling mean of primary/secondary close ratios with gaps filled
/// backward, then forward, then with 1.0.
fn hedge_ratios(ratios: &[f64], window: usize) -> Vec<f64> {
    let cleaned: Vec<f64> = ratios
        .iter()
        .map(|&r| if r == 0.0 || !r.is_finite() { f64::NAN } else { r })
        .collect();
    let mut rolled: Vec<f64> = rolling_mean(&cleaned, window)
        .into_iter()
        .map(|r| if r == 0.0 || !r.is_finite() { f64::NAN } else { r })
        .collect();

    let mut next = f64::NAN;
    for value in rolled.iter_mut().rev() {
        if value.is_nan() {
            *value = next;
        } else {
            next = *value;
        }
    }
    let mut prev = f64::NAN;
    for value in rolled.iter_mut() {
        if value.is_nan() {
            *value = prev;
        } else {
            prev = *value;
        }
    }
    for value in rolled.iter_mut() {
        if value.is_nan() {
            *value = 1.0;
        }
    }
    rolled
}

/// Build the spread series of `primary - hedge_ratio * secondary`.
pub fn build_pair_spread(
    primary: &[Bar],
    secondary: &[Bar],
    pair_symbol: &str,
    hedge_window: usize,
) -> Result<SpreadSeries, InputError> {
    let base = clean_bars(primary.to_vec());
    let pair = clean_bars(secondary.to_vec());

    let step_ms = [median_step_ms(&base), median_step_ms(&pair)]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(DEFAULT_STEP_MS);
    let tolerance_ms = (step_ms as f64 * 1.5) as i64;

    let pair_ts: Vec<DateTime<Utc>> = pair.iter().map(|b| b.timestamp).collect();
    let joined: Vec<(&Bar, &Bar)> = base
        .iter()
        .filter_map(|b| nearest_within(&pair_ts, b.timestamp, tolerance_ms).map(|j| (b, &pair[j])))
        .collect();
    if joined.is_empty() {
        return Err(InputError::EmptyPairOverlap);
    }

    let ratios: Vec<f64> = joined.iter().map(|(b, p)| b.close / p.close).collect();
    let hedge = hedge_ratios(&ratios, hedge_window.max(1));

    let raw: Vec<f64> = joined
        .iter()
        .zip(&hedge)
        .map(|((b, p), h)| b.close - h * p.close)
        .collect();
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let shift = if min.is_finite() && min <= 0.0 {
        min.abs() + SPREAD_SHIFT_EPSILON
    } else {
        0.0
    };

    let mut rows = Vec::with_capacity(joined.len());
    let mut prev_close: Option<f64> = None;
    for (i, (b, p)) in joined.iter().enumerate() {
        let close = raw[i] + shift;
        let open = prev_close.unwrap_or(close);
        let bar = Bar {
            timestamp: b.timestamp,
            open,
            high: close.max(open),
            low: close.min(open),
            close,
            volume: b.volume + p.volume,
        };
        prev_close = Some(close);
        if !bar.is_void() {
            rows.push(PairSpreadBar {
                bar,
                hedge_ratio: hedge[i],
            });
        }
    }

    tracing::debug!(
        pair = pair_symbol,
        rows = rows.len(),
        tolerance_ms,
        shift,
        "pair spread built"
    );

    Ok(SpreadSeries {
        pair_symbol: pair_symbol.to_string(),
        rows,
        shift,
        tolerance_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    const T0: i64 = 1_700_000_000_000;
    const HOUR: i64 = 3_600_000;

    fn series(closes: &[f64], offset_ms: i64) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::from_millis(T0 + offset_ms + i as i64 * HOUR, c, c + 1.0, c - 1.0, c, 100.0).unwrap())
            .collect()
    }

    #[test]
    fn median_step_of_regular_series() {
        assert_eq!(median_step_ms(&series(&[1.0, 2.0, 3.0], 0)), Some(HOUR));
        assert_eq!(median_step_ms(&series(&[1.0], 0)), None);
    }

    #[test]
    fn joins_skewed_timestamps_within_tolerance() {
        let primary = series(&[10.0, 11.0, 12.0, 13.0], 0);
        let secondary = series(&[5.0, 5.5, 6.0, 6.5], 30_000);
        let spread = build_pair_spread(&primary, &secondary, "ETH", 2).unwrap();
        assert_eq!(spread.len(), 4);
        assert_eq!(spread.tolerance_ms, HOUR * 3 / 2);
        assert_eq!(spread.pair_symbol, "ETH");
        // Spread timestamps follow the primary leg
        assert_eq!(spread.rows[0].bar.timestamp_ms(), T0);
    }

    #[test]
    fn disjoint_ranges_fail_with_empty_overlap() {
        let primary = series(&[10.0, 11.0, 12.0], 0);
        let secondary = series(&[10.0, 11.0, 12.0], 100 * HOUR);
        let err = build_pair_spread(&primary, &secondary, "X", 2).unwrap_err();
        assert_eq!(err, InputError::EmptyPairOverlap);
    }

    #[test]
    fn hedge_ratio_back_and_forward_filled() {
        let h = hedge_ratios(&[2.0, 4.0, f64::INFINITY, 2.0], 2);
        // window 2: [NaN, 3, NaN, NaN] -> bfill -> [3, 3, NaN, NaN] -> ffill -> all 3
        for v in h {
            assert_approx(v, 3.0, DEFAULT_EPSILON);
        }
        let none = hedge_ratios(&[0.0, 0.0], 2);
        assert_eq!(none, vec![1.0, 1.0]);
    }

    #[test]
    fn negative_raw_spread_is_shifted_positive() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 / 3.0).sin() * 5.0).collect();
        let tripled: Vec<f64> = (0..40).map(|i| 3.0 * (100.0 + ((i + 12) as f64 / 3.0).sin() * 5.0)).collect();
        let spread = build_pair_spread(&series(&closes, 0), &series(&tripled, 0), "PAIR2", 10).unwrap();
        assert!(spread.shift >= 0.0);
        assert!(spread.rows.iter().all(|r| r.bar.close > 0.0));
    }

    #[test]
    fn synthetic_ohlc_from_previous_close() {
        let primary = series(&[10.0, 12.0, 11.0], 0);
        let secondary = series(&[1.0, 1.0, 1.0], 0);
        let spread = build_pair_spread(&primary, &secondary, "P", 20).unwrap();
        let first = &spread.rows[0].bar;
        assert_eq!(first.open, first.close);
        for w in spread.rows.windows(2) {
            let (prev, cur) = (&w[0].bar, &w[1].bar);
            assert_eq!(cur.open, prev.close);
            assert_eq!(cur.high, cur.open.max(cur.close));
            assert_eq!(cur.low, cur.open.min(cur.close));
        }
        assert_eq!(first.volume, 200.0);
    }

    #[test]
    fn tie_prefers_earlier_secondary_bar() {
        let ts: Vec<DateTime<Utc>> = [0i64, 2_000]
            .iter()
            .map(|&ms| Bar::from_millis(ms, 1.0, 1.0, 1.0, 1.0, 1.0).unwrap().timestamp)
            .collect();
        let target = Bar::from_millis(1_000, 1.0, 1.0, 1.0, 1.0, 1.0).unwrap().timestamp;
        assert_eq!(nearest_within(&ts, target, 5_000), Some(0));
        assert_eq!(nearest_within(&ts, target, 999), None);
    }
}
