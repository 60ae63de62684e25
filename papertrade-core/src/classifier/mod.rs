//! Pluggable binary classifiers for the probability overlay.
//!
//! The overlay only talks to [`Classifier`] and asks a [`ClassifierFactory`]
//! for an implementation of the configured [`ModelKind`]. A factory that has
//! no implementation for a kind returns `None`, which the overlay reports as
//! a missing dependency instead of failing the run.

pub mod boosting;
pub mod forest;
pub mod logistic;
pub mod tree;

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use logistic::LogisticRegression;
pub use tree::{RegressionTree, TreeParams};

use crate::config::ModelKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("feature/label length mismatch: {features} feature rows, {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("feature row {row} has {found} columns, expected {expected}")]
    DimensionMismatch { row: usize, expected: usize, found: usize },

    #[error("singular system while fitting")]
    Singular,
}

/// A fitted-in-place binary classifier.
pub trait Classifier: Send {
    fn name(&self) -> &str;

    /// Fit on row-major features and boolean labels.
    fn fit(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<(), ClassifierError>;

    /// Probability of the positive class, in [0, 1].
    fn predict_probability(&self, features: &[f64]) -> f64;
}

/// Produces classifiers by kind. Randomness is seeded by the caller.
pub trait ClassifierFactory {
    fn build(&self, kind: ModelKind, seed: u64) -> Option<Box<dyn Classifier>>;
}

/// The pure-Rust implementations shipped with the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinClassifiers;

impl ClassifierFactory for BuiltinClassifiers {
    fn build(&self, kind: ModelKind, seed: u64) -> Option<Box<dyn Classifier>> {
        match kind {
            ModelKind::RandomForest => Some(Box::new(RandomForest::new(seed))),
            ModelKind::Xgboost => Some(Box::new(GradientBoosting::new(seed))),
            ModelKind::Logistic => Some(Box::new(LogisticRegression::new())),
        }
    }
}

/// Check shapes and return the feature dimension.
pub(crate) fn validate_training_set(
    features: &[Vec<f64>],
    labels: &[bool],
) -> Result<usize, ClassifierError> {
    if features.is_empty() {
        return Err(ClassifierError::EmptyTrainingSet);
    }
    if features.len() != labels.len() {
        return Err(ClassifierError::LengthMismatch {
            features: features.len(),
            labels: labels.len(),
        });
    }
    let dims = features[0].len();
    for (row, values) in features.iter().enumerate() {
        if values.len() != dims {
            return Err(ClassifierError::DimensionMismatch {
                row,
                expected: dims,
                found: values.len(),
            });
        }
    }
    Ok(dims)
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
