//! Deterministic content hashes used to fingerprint a run.

use super::bar::Bar;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash of the normalized strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    /// Hash any canonical byte representation (BLAKE3, hex).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash of a bar series: timestamps and all five numeric fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn of_bars(bars: &[Bar]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for bar in bars {
            hasher.update(&bar.timestamp_ms().to_le_bytes());
            for value in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
                hasher.update(&value.to_bits().to_le_bytes());
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::from_millis(i as i64 * 60_000, c, c, c, c, 1.0).unwrap())
            .collect()
    }

    #[test]
    fn dataset_hash_is_deterministic() {
        let a = DatasetHash::of_bars(&bars(&[1.0, 2.0, 3.0]));
        let b = DatasetHash::of_bars(&bars(&[1.0, 2.0, 3.0]));
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
    }

    #[test]
    fn dataset_hash_sees_price_changes() {
        let a = DatasetHash::of_bars(&bars(&[1.0, 2.0, 3.0]));
        let b = DatasetHash::of_bars(&bars(&[1.0, 2.0, 3.5]));
        assert_ne!(a, b);
    }

    #[test]
    fn config_hash_differs_by_content() {
        assert_ne!(ConfigHash::from_bytes(b"a"), ConfigHash::from_bytes(b"b"));
    }
}
