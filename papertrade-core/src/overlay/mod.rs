//! Auxiliary signal overlays: sentiment and classifier probability.

pub mod features;
pub mod probability;
pub mod sentiment;

pub use features::{build_features, FeatureMatrix, FEATURE_NAMES};
pub use probability::{
    estimate_probabilities, FitReport, FitStatus, ProbabilityOutput, MODEL_SEED, NEUTRAL_PROBABILITY,
};
pub use sentiment::{neutral_sentiment, score_text, SentimentOverlay, SentimentPoint, SENTIMENT_TOLERANCE_MS};
