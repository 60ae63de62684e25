//! Gradient-boosted trees with a logistic objective (the `xgboost` kind).
//!
//! Each round fits a depth-limited tree to the logistic gradients/hessians on
//! a row and column subsample, and adds `learning_rate` × leaf value to the
//! margin.

use super::tree::{RegressionTree, TreeParams};
use super::{sigmoid, validate_training_set, Classifier, ClassifierError};
use crate::rng::SeedHierarchy;
use rand::seq::index::sample;

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    rounds: usize,
    max_depth: usize,
    learning_rate: f64,
    subsample: f64,
    colsample: f64,
    lambda: f64,
    seeds: SeedHierarchy,
    trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn new(seed: u64) -> Self {
        Self {
            rounds: 120,
            max_depth: 3,
            learning_rate: 0.08,
            subsample: 0.9,
            colsample: 0.9,
            lambda: 1.0,
            seeds: SeedHierarchy::new(seed),
            trees: Vec::new(),
        }
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds.max(1);
        self
    }

    fn margin(&self, row: &[f64]) -> f64 {
        self.trees
            .iter()
            .map(|t| self.learning_rate * t.predict(row))
            .sum()
    }
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &str {
        "xgboost"
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<(), ClassifierError> {
        let dims = validate_training_set(features, labels)?;
        let n = features.len();
        let row_take = ((n as f64 * self.subsample) as usize).clamp(1, n);
        let col_take = ((dims as f64 * self.colsample).round() as usize).clamp(1, dims.max(1));
        let params = TreeParams {
            max_depth: self.max_depth,
            lambda: self.lambda,
            min_child_weight: 1.0,
            features_per_split: None,
        };

        self.trees.clear();
        let mut margins = vec![0.0; n];
        for round in 0..self.rounds {
            let mut grad = Vec::with_capacity(n);
            let mut hess = Vec::with_capacity(n);
            for (m, &y) in margins.iter().zip(labels) {
                let p = sigmoid(*m);
                grad.push(p - if y { 1.0 } else { 0.0 });
                hess.push((p * (1.0 - p)).max(1e-16));
            }

            let mut rng = self.seeds.rng_for("xgboost", round as u64);
            let mut rows = sample(&mut rng, n, row_take).into_vec();
            rows.sort_unstable();
            let mut cols = sample(&mut rng, dims, col_take).into_vec();
            cols.sort_unstable();

            let tree = RegressionTree::fit(features, &grad, &hess, &rows, &cols, &params, &mut rng);
            for (m, row) in margins.iter_mut().zip(features) {
                *m += self.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict_probability(&self, features: &[f64]) -> f64 {
        sigmoid(self.margin(features))
    }
}
