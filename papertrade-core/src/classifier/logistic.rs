//! L2-regularised logistic regression fitted with damped Newton steps on
//! standardised features.

use super::{sigmoid, validate_training_set, Classifier, ClassifierError};

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    max_iter: usize,
    /// Inverse regularisation strength, as in C = 1 / λ.
    c: f64,
    tolerance: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
    /// Intercept first, then one weight per feature.
    theta: Vec<f64>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            max_iter: 300,
            c: 1.0,
            tolerance: 1e-8,
            means: Vec::new(),
            scales: Vec::new(),
            theta: Vec::new(),
        }
    }

    fn design_row(&self, row: &[f64]) -> Vec<f64> {
        let mut out = Vec::with_capacity(row.len() + 1);
        out.push(1.0);
        for (j, v) in row.iter().enumerate() {
            let mean = self.means.get(j).copied().unwrap_or(0.0);
            let scale = self.scales.get(j).copied().unwrap_or(1.0);
            out.push((v - mean) / scale);
        }
        out
    }

    fn objective(&self, x: &[Vec<f64>], y: &[f64], theta: &[f64]) -> f64 {
        let lambda = 1.0 / self.c;
        let data: f64 = x
            .iter()
            .zip(y)
            .map(|(row, &yi)| {
                let z = dot(row, theta);
                softplus(z) - yi * z
            })
            .sum();
        let penalty: f64 = theta[1..].iter().map(|w| w * w).sum::<f64>() * lambda / 2.0;
        data + penalty
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// Solve `a · x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ClassifierError> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .ok_or(ClassifierError::Singular)?;
        if a[pivot][col].abs() < 1e-12 {
            return Err(ClassifierError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "logistic"
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[bool]) -> Result<(), ClassifierError> {
        let dims = validate_training_set(features, labels)?;
        let n = features.len() as f64;

        self.means = (0..dims)
            .map(|j| features.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        self.scales = (0..dims)
            .map(|j| {
                let m = self.means[j];
                let var = features.iter().map(|r| (r[j] - m) * (r[j] - m)).sum::<f64>() / n;
                if var > 0.0 {
                    var.sqrt()
                } else {
                    1.0
                }
            })
            .collect();

        let x: Vec<Vec<f64>> = features.iter().map(|r| self.design_row(r)).collect();
        let y: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let p_dim = dims + 1;
        let lambda = 1.0 / self.c;
        let mut theta = vec![0.0; p_dim];
        let mut current = self.objective(&x, &y, &theta);

        for _ in 0..self.max_iter {
            let mut grad = vec![0.0; p_dim];
            let mut hess = vec![vec![0.0; p_dim]; p_dim];
            for (row, &yi) in x.iter().zip(&y) {
                let p = sigmoid(dot(row, &theta));
                let w = p * (1.0 - p);
                for a in 0..p_dim {
                    grad[a] += (p - yi) * row[a];
                    for b in a..p_dim {
                        hess[a][b] += w * row[a] * row[b];
                    }
                }
            }
            for a in 0..p_dim {
                for b in 0..a {
                    hess[a][b] = hess[b][a];
                }
            }
            for j in 1..p_dim {
                grad[j] += lambda * theta[j];
                hess[j][j] += lambda;
            }
            hess[0][0] += 1e-9;

            let step = solve(hess, grad)?;

            // Halve the step until the objective stops increasing
            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..20 {
                let candidate: Vec<f64> = theta.iter().zip(&step).map(|(t, s)| t - scale * s).collect();
                let value = self.objective(&x, &y, &candidate);
                if value <= current {
                    accepted = Some((candidate, value));
                    break;
                }
                scale /= 2.0;
            }
            let Some((next, value)) = accepted else {
                break;
            };
            let moved = step.iter().map(|s| (s * scale).abs()).fold(0.0, f64::max);
            theta = next;
            current = value;
            if moved < self.tolerance {
                break;
            }
        }

        self.theta = theta;
        Ok(())
    }

    fn predict_probability(&self, features: &[f64]) -> f64 {
        if self.theta.is_empty() {
            return 0.5;
        }
        sigmoid(dot(&self.design_row(features), &self.theta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::testdata::two_clusters;

    #[test]
    fn solves_small_system() {
        let x = solve(vec![vec![2.0, 1.0], vec![1.0, 3.0]], vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
        assert_eq!(
            solve(vec![vec![1.0, 2.0], vec![2.0, 4.0]], vec![1.0, 2.0]).unwrap_err(),
            ClassifierError::Singular
        );
    }

    #[test]
    fn separates_clusters_with_bounded_weights() {
        let (x, y) = two_clusters(80);
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(model.predict_probability(&[2.0, 0.0, 1.0]) > 0.9);
        assert!(model.predict_probability(&[-2.0, 0.0, 1.0]) < 0.1);
        assert!(model.theta.iter().all(|t| t.is_finite()));
    }

    #[test]
    fn constant_feature_does_not_break_fit() {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 7.0]).collect();
        let labels: Vec<bool> = (0..20).map(|i| i >= 10).collect();
        let mut model = LogisticRegression::new();
        model.fit(&features, &labels).unwrap();
        assert!(model.predict_probability(&[19.0, 7.0]) > model.predict_probability(&[0.0, 7.0]));
    }
}
