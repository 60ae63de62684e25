//! Random forest: bootstrap-sampled variance-reduction trees, √d features per
//! split, probability = mean of leaf label frequencies.

use super::tree::{RegressionTree, TreeParams};
use super::{validate_training_set, Classifier, ClassifierError};
use crate::rng::SeedHierarchy;
use rand::Rng;

pub const DEFAULT_TREES: usize = 250;
pub const DEFAULT_MAX_DEPTH: usize = 8;

#[derive(Debug, Clone)]
pub struct RandomForest {
    n_trees: usize,
    max_depth: usize,
    seeds: SeedHierarchy,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(seed: u64) -> Self {
        Self::with_shape(seed, DEFAULT_TREES, DEFAULT_MAX_DEPTH)
    }

    pub fn with_shape(seed: u64, n_trees: usize, max_depth: usize) -> Self {
        Self {
            n_trees: n_trees.max(1),
            max_depth,
            seeds: SeedHierarchy::new(seed),
            trees: Vec::new(),
        }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<(), ClassifierError> {
        let dims = validate_training_set(features, labels)?;
        let n = features.len();
        let grad: Vec<f64> = labels.iter().map(|&y| if y { -1.0 } else { 0.0 }).collect();
        let hess = vec![1.0; n];
        let all_features: Vec<usize> = (0..dims).collect();
        let params = TreeParams {
            max_depth: self.max_depth,
            lambda: 0.0,
            min_child_weight: 1.0,
            features_per_split: Some(((dims as f64).sqrt() as usize).max(1)),
        };

        self.trees = (0..self.n_trees)
            .map(|t| {
                let mut rng = self.seeds.rng_for("random_forest", t as u64);
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(features, &grad, &hess, &rows, &all_features, &params, &mut rng)
            })
            .collect();
        Ok(())
    }

    fn predict_probability(&self, features: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::testdata::two_clusters;

    #[test]
    fn separates_two_clusters() {
        let (x, y) = two_clusters(80);
        let mut forest = RandomForest::with_shape(42, 25, 4);
        forest.fit(&x, &y).unwrap();
        assert_eq!(forest.tree_count(), 25);
        assert!(forest.predict_probability(&[2.0, 0.0, 1.0]) > 0.7);
        assert!(forest.predict_probability(&[-2.0, 0.0, 1.0]) < 0.3);
    }

    #[test]
    fn same_seed_same_predictions() {
        let (x, y) = two_clusters(60);
        let mut a = RandomForest::with_shape(42, 10, 3);
        let mut b = RandomForest::with_shape(42, 10, 3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        for row in &x {
            assert_eq!(a.predict_probability(row), b.predict_probability(row));
        }
    }

    #[test]
    fn unfitted_forest_is_neutral() {
        assert_eq!(RandomForest::new(42).predict_probability(&[1.0]), 0.5);
    }
}
