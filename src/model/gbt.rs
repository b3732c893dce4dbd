//! Gradient-boosted regression trees.
//!
//! Least-squares boosting: start from the target mean, then repeatedly fit a
//! shallow CART tree to the residuals and add a shrunken copy of it to the
//! ensemble. Row and column subsampling use a seeded RNG so a given dataset
//! and seed always produce the same model.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{DesignMatrix, FittedModel, Regressor};

/// Booster hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows sampled for each tree.
    pub subsample: f64,
    /// Fraction of features considered by each tree.
    pub colsample: f64,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 4,
            learning_rate: 0.1,
            subsample: 0.9,
            colsample: 0.9,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// A single regression tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn eval(&self, row: &[f32]) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if f64::from(row[*feature]) <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Largest feature index any split reads, or `None` for a leaf.
    pub fn max_feature(&self) -> Option<usize> {
        match self {
            TreeNode::Leaf { .. } => None,
            TreeNode::Split {
                feature,
                left,
                right,
                ..
            } => Some(*feature).max(left.max_feature()).max(right.max_feature()),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// A fitted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedModel {
    pub base_score: f64,
    pub learning_rate: f64,
    pub n_features: usize,
    pub trees: Vec<TreeNode>,
}

impl FittedModel for BoostedModel {
    fn predict(&self, row: &[f32]) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.eval(row)).sum::<f64>()
    }

    fn check_input_width(&self, width: usize) -> std::result::Result<(), String> {
        if self.n_features != width {
            return Err(format!(
                "model was fitted on {} features, schema has {width}",
                self.n_features
            ));
        }
        match self.trees.iter().filter_map(TreeNode::max_feature).max() {
            Some(f) if f >= width => Err(format!("tree splits on feature {f} of {width}")),
            _ => Ok(()),
        }
    }
}

/// The default [`Regressor`].
#[derive(Debug, Clone, Default)]
pub struct GradientBoostedTrees {
    pub params: BoosterParams,
}

impl GradientBoostedTrees {
    pub fn new(params: BoosterParams) -> Self {
        Self { params }
    }
}

fn sample_size(n: usize, fraction: f64) -> usize {
    ((n as f64 * fraction).ceil() as usize).clamp(1, n)
}

struct TreeBuilder<'a> {
    x: &'a DesignMatrix,
    residuals: &'a [f64],
    features: &'a [usize],
    max_depth: usize,
    min_leaf: usize,
}

impl TreeBuilder<'_> {
    fn value(&self, rows: &[usize]) -> f64 {
        rows.iter().map(|&i| self.residuals[i]).sum::<f64>() / rows.len() as f64
    }

    fn build(&self, rows: Vec<usize>, depth: usize) -> TreeNode {
        let leaf = TreeNode::Leaf {
            value: self.value(&rows),
        };
        if depth >= self.max_depth || rows.len() < 2 * self.min_leaf {
            return leaf;
        }

        let Some((feature, threshold)) = self.best_split(&rows) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| f64::from(self.x.row(i)[feature]) <= threshold);
        if left.is_empty() || right.is_empty() {
            return leaf;
        }

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    /// Finds the split with the largest reduction in squared error.
    fn best_split(&self, rows: &[usize]) -> Option<(usize, f64)> {
        let n = rows.len();
        let total: f64 = rows.iter().map(|&i| self.residuals[i]).sum();
        let parent = total * total / n as f64;

        let mut best: Option<(f64, usize, f64)> = None;

        for &feature in self.features {
            let mut sorted: Vec<(f32, f64)> = rows
                .iter()
                .map(|&i| (self.x.row(i)[feature], self.residuals[i]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for k in 1..n {
                left_sum += sorted[k - 1].1;
                if k < self.min_leaf || n - k < self.min_leaf {
                    continue;
                }
                let (lo, hi) = (sorted[k - 1].0, sorted[k].0);
                if lo >= hi {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / k as f64
                    + right_sum * right_sum / (n - k) as f64
                    - parent;

                if gain > 1e-12 && best.is_none_or(|(g, _, _)| gain > g) {
                    let threshold = (f64::from(lo) + f64::from(hi)) / 2.0;
                    best = Some((gain, feature, threshold));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }
}

impl Regressor for GradientBoostedTrees {
    type Model = BoostedModel;

    #[tracing::instrument(skip_all, fields(rows = x.n_rows(), trees = self.params.n_estimators))]
    fn fit(&self, x: &DesignMatrix, y: &[f32]) -> Result<BoostedModel> {
        let p = &self.params;
        let n = x.n_rows();
        if n != y.len() {
            return Err(Error::Model(format!(
                "design matrix has {n} rows but {} targets were given",
                y.len()
            )));
        }
        if n == 0 {
            return Err(Error::Model("cannot fit with zero samples".into()));
        }

        let y: Vec<f64> = y.iter().map(|&v| f64::from(v)).collect();
        let base_score = y.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base_score; n];
        let mut rng = StdRng::seed_from_u64(p.seed);

        let all_rows: Vec<usize> = (0..n).collect();
        let all_features: Vec<usize> = (0..x.n_cols()).collect();
        let n_rows = sample_size(n, p.subsample);
        let n_features = sample_size(x.n_cols(), p.colsample);

        let mut trees = Vec::with_capacity(p.n_estimators);
        for _ in 0..p.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&predictions).map(|(t, p)| t - p).collect();

            let mut rows = all_rows.clone();
            rows.shuffle(&mut rng);
            rows.truncate(n_rows);

            let mut features = all_features.clone();
            features.shuffle(&mut rng);
            features.truncate(n_features);

            let builder = TreeBuilder {
                x,
                residuals: &residuals,
                features: &features,
                max_depth: p.max_depth,
                min_leaf: p.min_samples_leaf.max(1),
            };
            let tree = builder.build(rows, 0);

            for (i, pred) in predictions.iter_mut().enumerate() {
                *pred += p.learning_rate * tree.eval(x.row(i));
            }
            trees.push(tree);
        }

        debug!(base_score, trees = trees.len(), "Booster fitted");
        Ok(BoostedModel {
            base_score,
            learning_rate: p.learning_rate,
            n_features: x.n_cols(),
            trees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureVector, WeatherObservation};
    use crate::schema::FeatureSchema;

    /// Incidents jump when the daily maximum crosses 30 °C.
    fn step_dataset() -> (DesignMatrix, Vec<f32>) {
        let mut x = DesignMatrix::new(FeatureSchema::canonical());
        let mut y = Vec::new();
        for i in 0..40 {
            let max = 20.0 + i as f64 * 0.5;
            let obs = WeatherObservation::new(max, max - 8.0, 60.0).unwrap();
            x.push(&FeatureVector::from_observation(&obs).unwrap()).unwrap();
            y.push(if max > 30.0 { 10.0 } else { 1.0 });
        }
        (x, y)
    }

    #[test]
    fn test_learns_step() {
        let (x, y) = step_dataset();
        let model = GradientBoostedTrees::default().fit(&x, &y).unwrap();

        let preds = model.predict_matrix(&x);
        for (p, t) in preds.iter().zip(&y) {
            assert!((p - f64::from(*t)).abs() < 0.5, "pred {p} target {t}");
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = step_dataset();
        let a = GradientBoostedTrees::default().fit(&x, &y).unwrap();
        let b = GradientBoostedTrees::default().fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_depth_limit() {
        let (x, y) = step_dataset();
        let params = BoosterParams {
            n_estimators: 5,
            max_depth: 2,
            ..Default::default()
        };
        let model = GradientBoostedTrees::new(params).fit(&x, &y).unwrap();
        assert_eq!(model.trees.len(), 5);
        assert!(model.trees.iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn test_constant_target() {
        let (x, _) = step_dataset();
        let y = vec![3.0; x.n_rows()];
        let model = GradientBoostedTrees::default().fit(&x, &y).unwrap();
        assert_eq!(model.predict(x.row(0)), 3.0);
    }

    #[test]
    fn test_input_width_check() {
        let (x, y) = step_dataset();
        let model = GradientBoostedTrees::default().fit(&x, &y).unwrap();
        assert_eq!(model.check_input_width(5), Ok(()));
        assert!(model.check_input_width(4).is_err());

        let corrupt = BoostedModel {
            base_score: 0.0,
            learning_rate: 0.1,
            n_features: 5,
            trees: vec![TreeNode::Split {
                feature: 7,
                threshold: 0.0,
                left: Box::new(TreeNode::Leaf { value: 1.0 }),
                right: Box::new(TreeNode::Leaf { value: 2.0 }),
            }],
        };
        assert!(corrupt.check_input_width(5).unwrap_err().contains("feature 7"));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let (x, _) = step_dataset();
        assert!(matches!(
            GradientBoostedTrees::default().fit(&x, &[1.0]),
            Err(Error::Model(_))
        ));

        let empty = DesignMatrix::new(FeatureSchema::canonical());
        assert!(matches!(
            GradientBoostedTrees::default().fit(&empty, &[]),
            Err(Error::Model(_))
        ));
    }
}
