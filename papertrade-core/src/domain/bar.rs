//! Bar: the fundamental market data unit.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar for one sampling interval.
///
/// Bars are parsed once from input and never mutated afterwards. A cleaned
/// series has strictly increasing timestamps and finite numeric fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Build a bar from an epoch-milliseconds timestamp.
    ///
    /// Returns `None` when the timestamp is outside chrono's range.
    pub fn from_millis(
        timestamp_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Option<Self> {
        let timestamp = Utc.timestamp_millis_opt(timestamp_ms).single()?;
        Some(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Returns true if any OHLCV field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }
}

/// Drop void bars, sort by timestamp and keep the first bar of each timestamp.
pub fn clean_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.retain(|b| !b.is_void());
    // Stable sort keeps file order among equal timestamps.
    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);
    bars
}
