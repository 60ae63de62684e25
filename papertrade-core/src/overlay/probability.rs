//! Probability Overlay.
//!
//! Trains a seeded binary classifier on the feature matrix to estimate
//! P(close `horizon` bars ahead > close now). Every precondition is checked
//! up front and reported as a [`FitStatus`]; whenever one fails, or the
//! overlay is disabled, every bar gets the neutral 0.5.
//!
//! The split is chronological: the first `train_ratio` of labelled rows
//! trains, the rest is scored out of sample and written back at its
//! row positions.

use super::features::build_features;
use crate::classifier::ClassifierFactory;
use crate::config::{MlConfig, ModelKind};
use crate::domain::round_to;
use crate::indicators::ReadyRow;
use serde::{Deserialize, Serialize};

pub const NEUTRAL_PROBABILITY: f64 = 0.5;
pub const MODEL_SEED: u64 = 42;

const MIN_USABLE_ROWS: usize = 120;
const MIN_FEATURE_ROWS: usize = 100;
const MIN_TRAINING_ROWS: usize = 100;
const MIN_TRAIN_SPLIT: usize = 40;

/// Outcome of the fit attempt, serialized as the report's `ml_model_fit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    NotTrained,
    InsufficientData,
    InsufficientFeatures,
    InsufficientTrainingRows,
    SingleClassTarget,
    InvalidTrainSplit,
    EmptyTestWindow,
    MissingMlDependency,
    FitFailed,
    Trained,
}

impl FitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitStatus::NotTrained => "not_trained",
            FitStatus::InsufficientData => "insufficient_data",
            FitStatus::InsufficientFeatures => "insufficient_features",
            FitStatus::InsufficientTrainingRows => "insufficient_training_rows",
            FitStatus::SingleClassTarget => "single_class_target",
            FitStatus::InvalidTrainSplit => "invalid_train_split",
            FitStatus::EmptyTestWindow => "empty_test_window",
            FitStatus::MissingMlDependency => "missing_ml_dependency",
            FitStatus::FitFailed => "fit_failed",
            FitStatus::Trained => "trained",
        }
    }
}

impl std::fmt::Display for FitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub enabled: bool,
    pub model_type: ModelKind,
    pub horizon: usize,
    pub train_ratio: f64,
    pub confidence: f64,
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub eval_rows: usize,
    pub accuracy: f64,
    pub prediction_available: bool,
    pub model_fit: FitStatus,
}

impl FitReport {
    fn new(config: &MlConfig, rows: usize) -> Self {
        Self {
            enabled: config.enabled,
            model_type: config.model_type,
            horizon: config.horizon.max(1),
            train_ratio: config.train_ratio,
            confidence: config.confidence,
            rows,
            train_rows: 0,
            test_rows: 0,
            eval_rows: 0,
            accuracy: 0.0,
            prediction_available: false,
            model_fit: FitStatus::NotTrained,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityOutput {
    /// One probability per ready row.
    pub probability: Vec<f64>,
    pub report: FitReport,
}

impl ProbabilityOutput {
    fn neutral(report: FitReport) -> Self {
        if report.enabled {
            tracing::info!(status = %report.model_fit, rows = report.rows, "probability overlay degraded to neutral");
        }
        Self {
            probability: vec![NEUTRAL_PROBABILITY; report.rows],
            report,
        }
    }
}

/// Estimate per-row up-probabilities for the simulation.
///
/// `sentiment` is aligned with `rows`. Never fails: every problem becomes a
/// [`FitStatus`] and neutral output.
pub fn estimate_probabilities(
    rows: &[ReadyRow],
    sentiment: &[f64],
    config: &MlConfig,
    factory: &dyn ClassifierFactory,
) -> ProbabilityOutput {
    let mut report = FitReport::new(config, rows.len());
    if !config.enabled {
        return ProbabilityOutput::neutral(report);
    }
    if rows.len() < MIN_USABLE_ROWS {
        report.model_fit = FitStatus::InsufficientData;
        return ProbabilityOutput::neutral(report);
    }

    let features = build_features(rows, sentiment);
    if features.len() < MIN_FEATURE_ROWS {
        report.model_fit = FitStatus::InsufficientFeatures;
        return ProbabilityOutput::neutral(report);
    }

    // Rows without a close `horizon` bars ahead carry no label.
    let horizon = report.horizon;
    let mut positions = Vec::new();
    let mut x = Vec::new();
    let mut y = Vec::new();
    for (&pos, values) in features.positions.iter().zip(&features.values) {
        if let Some(ahead) = rows.get(pos + horizon) {
            positions.push(pos);
            x.push(values.clone());
            y.push(ahead.bar.close > rows[pos].bar.close);
        }
    }
    if x.len() < MIN_TRAINING_ROWS {
        report.model_fit = FitStatus::InsufficientTrainingRows;
        return ProbabilityOutput::neutral(report);
    }
    if y.iter().all(|&l| l) || y.iter().all(|&l| !l) {
        report.model_fit = FitStatus::SingleClassTarget;
        return ProbabilityOutput::neutral(report);
    }

    let n = x.len();
    let ratio = report.train_ratio;
    let split = if ratio.is_finite() && ratio > 0.0 {
        (n as f64 * ratio).floor() as usize
    } else {
        0
    };
    if split < MIN_TRAIN_SPLIT || split >= n {
        report.model_fit = FitStatus::InvalidTrainSplit;
        return ProbabilityOutput::neutral(report);
    }
    let (x_train, x_test) = x.split_at(split);
    let (y_train, y_test) = y.split_at(split);
    if y_test.is_empty() {
        report.model_fit = FitStatus::EmptyTestWindow;
        return ProbabilityOutput::neutral(report);
    }

    let Some(mut model) = factory.build(config.model_type, MODEL_SEED) else {
        report.model_fit = FitStatus::MissingMlDependency;
        return ProbabilityOutput::neutral(report);
    };
    if let Err(err) = model.fit(x_train, y_train) {
        tracing::warn!(error = %err, model = model.name(), "classifier fit failed");
        report.model_fit = FitStatus::FitFailed;
        return ProbabilityOutput::neutral(report);
    }

    let mut probability = vec![NEUTRAL_PROBABILITY; rows.len()];
    let mut correct = 0usize;
    for ((values, &label), &pos) in x_test.iter().zip(y_test).zip(&positions[split..]) {
        let p = model.predict_probability(values);
        probability[pos] = p;
        if (p >= report.confidence) == label {
            correct += 1;
        }
    }

    report.train_rows = x_train.len();
    report.test_rows = x_test.len();
    report.eval_rows = y_test.len();
    report.accuracy = round_to(correct as f64 / y_test.len() as f64, 6);
    report.prediction_available = true;
    report.model_fit = FitStatus::Trained;
    tracing::info!(
        model = model.name(),
        train_rows = report.train_rows,
        test_rows = report.test_rows,
        accuracy = report.accuracy,
        "probability overlay trained"
    );

    ProbabilityOutput { probability, report }
}
