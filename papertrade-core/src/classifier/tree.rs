//! Regression tree grown on first/second-order gradient statistics.
//!
//! A node with gradient sum G and hessian sum H has score G² / (H + λ) and
//! leaf value -G / (H + λ). With g = -y, h = 1 and λ = 0 this is a plain
//! variance-reduction tree whose leaves hold the mean label (random forest);
//! with logistic gradients it is a boosting tree.

use rand::rngs::StdRng;
use rand::seq::index::sample;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    /// L2 penalty on leaf values.
    pub lambda: f64,
    /// Minimum hessian sum in each child.
    pub min_child_weight: f64,
    /// Features drawn per split; `None` considers all allowed features.
    pub features_per_split: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Grower<'a> {
    x: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    features: &'a [usize],
    params: &'a TreeParams,
    nodes: Vec<Node>,
}

struct BestSplit {
    gain: f64,
    feature: usize,
    threshold: f64,
}

impl Grower<'_> {
    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.params.lambda;
        if denom > 0.0 {
            -g / denom
        } else {
            0.0
        }
    }

    fn best_split(&self, rows: &[usize], candidates: &[usize], g: f64, h: f64) -> Option<BestSplit> {
        let parent = self.score(g, h);
        let mut best: Option<BestSplit> = None;
        for &feature in candidates {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let (mut gl, mut hl) = (0.0, 0.0);
            for i in 0..sorted.len() - 1 {
                let r = sorted[i];
                gl += self.grad[r];
                hl += self.hess[r];
                let here = self.x[r][feature];
                let next = self.x[sorted[i + 1]][feature];
                if here == next {
                    continue;
                }
                let (gr, hr) = (g - gl, h - hl);
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = self.score(gl, hl) + self.score(gr, hr) - parent;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mid = here + (next - here) / 2.0;
                    let threshold = if mid < next { mid } else { here };
                    best = Some(BestSplit {
                        gain,
                        feature,
                        threshold,
                    });
                }
            }
        }
        best
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.hess[r]).sum();
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.leaf_value(g, h),
        });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return id;
        }

        let candidates: Vec<usize> = match self.params.features_per_split {
            Some(k) if k < self.features.len() => sample(rng, self.features.len(), k.max(1))
                .into_iter()
                .map(|i| self.features[i])
                .collect(),
            _ => self.features.to_vec(),
        };

        let mut best = self.best_split(&rows, &candidates, g, h);
        if best.is_none() && candidates.len() < self.features.len() {
            // Keep searching the features that were not drawn
            let rest: Vec<usize> = self
                .features
                .iter()
                .copied()
                .filter(|f| !candidates.contains(f))
                .collect();
            best = self.best_split(&rows, &rest, g, h);
        }

        let Some(split) = best else {
            return id;
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.x[r][split.feature] <= split.threshold);

        let left = self.grow(left_rows, depth + 1, rng);
        let right = self.grow(right_rows, depth + 1, rng);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }
}

impl RegressionTree {
    /// Grow a tree over `rows` (indices into `x`, repeats allowed).
    pub fn fit(
        x: &[Vec<f64>],
        grad: &[f64],
        hess: &[f64],
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut grower = Grower {
            x,
            grad,
            hess,
            features,
            params,
            nodes: Vec::new(),
        };
        grower.grow(rows.to_vec(), 0, rng);
        Self {
            nodes: grower.nodes,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(f64::NAN);
                    id = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes.get(id) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn mean_params(depth: usize) -> TreeParams {
        TreeParams {
            max_depth: depth,
            lambda: 0.0,
            min_child_weight: 1.0,
            features_per_split: None,
        }
    }

    #[test]
    fn splits_on_informative_feature() {
        let x = vec![vec![0.0, 5.0], vec![1.0, 5.0], vec![2.0, 5.0], vec![3.0, 5.0]];
        let y = [0.0, 0.0, 1.0, 1.0];
        let grad: Vec<f64> = y.iter().map(|v| -v).collect();
        let hess = vec![1.0; 4];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = RegressionTree::fit(&x, &grad, &hess, &[0, 1, 2, 3], &[0, 1], &mean_params(3), &mut rng);

        assert_eq!(tree.predict(&[0.5, 5.0]), 0.0);
        assert_eq!(tree.predict(&[2.5, 5.0]), 1.0);
        // Pure children stop growing
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn depth_limit_respected() {
        let x: Vec<Vec<f64>> = (0..32).map(|i| vec![i as f64]).collect();
        let grad: Vec<f64> = (0..32).map(|i| -((i % 2) as f64)).collect();
        let hess = vec![1.0; 32];
        let rows: Vec<usize> = (0..32).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let tree = RegressionTree::fit(&x, &grad, &hess, &rows, &[0], &mean_params(2), &mut rng);
        assert!(tree.depth() <= 2);
        assert!(tree.node_count() <= 7);
    }

    #[test]
    fn constant_features_yield_single_leaf() {
        let x = vec![vec![1.0], vec![1.0], vec![1.0]];
        let grad = vec![-1.0, 0.0, -1.0];
        let hess = vec![1.0; 3];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = RegressionTree::fit(&x, &grad, &hess, &[0, 1, 2], &[0], &mean_params(4), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert!((tree.predict(&[1.0]) - 2.0 / 3.0).abs() < 1e-12);
    }
}
