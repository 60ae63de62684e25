//! Sentiment Overlay.
//!
//! External sentiment points are joined onto the bar timeline by nearest
//! timestamp within two hours, scaled by the configured weight and clipped to
//! [-1, 1]. Bars without a match get 0.

use crate::spread::nearest_within;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Join tolerance between a bar and a sentiment point.
pub const SENTIMENT_TOLERANCE_MS: i64 = 2 * 3_600_000;

const BULLISH: &[&str] = &[
    "bullish",
    "surge",
    "rally",
    "up",
    "gain",
    "gains",
    "growth",
    "adopt",
    "adoption",
    "breakout",
    "upgrade",
    "partnership",
    "approval",
    "profit",
    "long",
    "strong",
    "positive",
];

const BEARISH: &[&str] = &[
    "bearish",
    "crash",
    "dump",
    "drop",
    "loss",
    "losses",
    "hack",
    "hackers",
    "scam",
    "ban",
    "regulation",
    "lawsuit",
    "delist",
    "liquidation",
    "short",
    "down",
    "weak",
    "negative",
    "fear",
];

/// Score free text as +1, -1 or 0 by net keyword count.
///
/// Words are the ASCII-letter runs of the lowercased text.
pub fn score_text(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let net: i64 = lowered
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| i64::from(BULLISH.contains(&w)) - i64::from(BEARISH.contains(&w)))
        .sum();
    match net.signum() {
        1 => 1.0,
        -1 => -1.0,
        _ => 0.0,
    }
}

/// One raw sentiment observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentimentOverlay {
    points: Vec<SentimentPoint>,
}

impl SentimentOverlay {
    /// Points are sorted by timestamp; non-finite scores count as 0.
    pub fn new(mut points: Vec<SentimentPoint>) -> Self {
        for p in points.iter_mut() {
            if !p.score.is_finite() {
                p.score = 0.0;
            }
        }
        points.sort_by_key(|p| p.timestamp);
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// One weighted, clipped score per timeline entry.
    pub fn align(&self, timeline: &[DateTime<Utc>], weight: f64) -> Vec<f64> {
        if self.points.is_empty() {
            return neutral_sentiment(timeline.len());
        }
        let stamps: Vec<DateTime<Utc>> = self.points.iter().map(|p| p.timestamp).collect();
        timeline
            .iter()
            .map(|&ts| match nearest_within(&stamps, ts, SENTIMENT_TOLERANCE_MS) {
                Some(j) => (self.points[j].score * weight).clamp(-1.0, 1.0),
                None => 0.0,
            })
            .collect()
    }
}

/// Series used when no sentiment source is available.
pub fn neutral_sentiment(len: usize) -> Vec<f64> {
    vec![0.0; len]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn text_scoring_counts_keywords() {
        assert_eq!(score_text("BTC rally continues, strong adoption"), 1.0);
        assert_eq!(score_text("Exchange hack triggers crash"), -1.0);
        assert_eq!(score_text("rally then crash"), 0.0);
        assert_eq!(score_text("nothing to see"), 0.0);
        assert_eq!(score_text(""), 0.0);
        // Punctuation and digits split words
        assert_eq!(score_text("up-trend: 3x gains!"), 1.0);
    }

    #[test]
    fn joins_within_two_hours_and_clips() {
        let overlay = SentimentOverlay::new(vec![
            SentimentPoint { timestamp: ts(0), score: 0.8 },
            SentimentPoint { timestamp: ts(10 * 3_600_000), score: -1.0 },
        ]);
        let timeline = [ts(3_600_000), ts(2 * 3_600_000), ts(5 * 3_600_000), ts(9 * 3_600_000)];
        let out = overlay.align(&timeline, 2.0);
        assert_eq!(out, vec![1.0, 1.0, 0.0, -1.0]);
    }

    #[test]
    fn absent_source_is_all_zero() {
        let out = SentimentOverlay::default().align(&[ts(0), ts(1)], 1.0);
        assert_eq!(out, vec![0.0, 0.0]);
        assert_eq!(neutral_sentiment(3), vec![0.0; 3]);
    }

    #[test]
    fn unsorted_points_and_nan_scores() {
        let overlay = SentimentOverlay::new(vec![
            SentimentPoint { timestamp: ts(7_200_000), score: f64::NAN },
            SentimentPoint { timestamp: ts(0), score: 0.5 },
        ]);
        let out = overlay.align(&[ts(0), ts(7_200_000)], 1.0);
        assert_eq!(out, vec![0.5, 0.0]);
    }
}
