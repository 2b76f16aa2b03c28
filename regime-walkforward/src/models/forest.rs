//! Random forest classifier.
//!
//! Bagged CART trees with Gini impurity. Each tree draws its bootstrap
//! sample and per-split feature subsets from its own ChaCha RNG seeded with
//! `seed + tree_index`, so a fit is reproducible regardless of how rayon
//! schedules the trees.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::adapter::{check_training_data, ModelAdapter, ModelError};

const MODEL_NAME: &str = "RandomForestTradingModel";

/// Random forest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples to split a node
    pub min_samples_split: usize,
    /// Minimum samples in each leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (sqrt of total if None)
    pub max_features: Option<usize>,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        /// Fraction of class 1 among the node's samples.
        p_up: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn p_up(&self, row: &[f64]) -> f64 {
        match self {
            Node::Leaf { p_up } => *p_up,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.p_up(row)
                } else {
                    right.p_up(row)
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    config: &'a ForestConfig,
    max_features: usize,
    rng: ChaCha8Rng,
}

impl TreeBuilder<'_> {
    fn build(&mut self, indices: &[usize], depth: usize) -> Node {
        let n = indices.len();
        let ones = indices.iter().filter(|&&i| self.y[i] == 1).count();
        let p_up = if n > 0 { ones as f64 / n as f64 } else { 0.5 };

        if depth >= self.config.max_depth
            || n < self.config.min_samples_split
            || ones == 0
            || ones == n
        {
            return Node::Leaf { p_up };
        }

        match self.best_split(indices, ones) {
            Some((feature, threshold)) => {
                let (left, right): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| self.x[i][feature] <= threshold);
                Node::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(&left, depth + 1)),
                    right: Box::new(self.build(&right, depth + 1)),
                }
            }
            None => Node::Leaf { p_up },
        }
    }

    /// Best (feature, threshold) by Gini gain, sweeping sorted values once
    /// per candidate feature.
    fn best_split(&mut self, indices: &[usize], ones: usize) -> Option<(usize, f64)> {
        let n_features = self.x[0].len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);
        features.truncate(self.max_features);

        let n = indices.len();
        let parent = gini(ones, n);
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best_gain = 0.0;
        let mut best = None;

        for feature in features {
            let mut pairs: Vec<(f64, u8)> = indices
                .iter()
                .map(|&i| (self.x[i][feature], self.y[i]))
                .collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_ones = 0;
            for k in 0..n - 1 {
                left_ones += pairs[k].1 as usize;
                let n_left = k + 1;
                let n_right = n - n_left;
                if pairs[k].0 == pairs[k + 1].0 || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let weighted = (n_left as f64 * gini(left_ones, n_left)
                    + n_right as f64 * gini(ones - left_ones, n_right))
                    / n as f64;
                let gain = parent - weighted;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some((feature, (pairs[k].0 + pairs[k + 1].0) / 2.0));
                }
            }
        }
        best
    }
}

fn gini(ones: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = ones as f64 / n as f64;
    1.0 - p * p - (1.0 - p) * (1.0 - p)
}

/// Bagged ensemble of classification trees.
#[derive(Debug, Clone)]
pub struct RandomForestModel {
    config: ForestConfig,
    trees: Vec<Node>,
    n_features: usize,
}

impl RandomForestModel {
    pub fn new(config: ForestConfig) -> Self {
        info!(
            "Initialized {} (n_trees={}, max_depth={})",
            MODEL_NAME, config.n_trees, config.max_depth
        );
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean class-1 probability across trees.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Prediction("model has not been fitted".to_string()));
        }
        if row.len() != self.n_features {
            return Err(ModelError::Prediction(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        let total: f64 = self.trees.iter().map(|t| t.p_up(row)).sum();
        Ok(total / self.trees.len() as f64)
    }
}

impl ModelAdapter for RandomForestModel {
    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), ModelError> {
        let n_features = check_training_data(x, y)?;
        if n_features == 0 {
            return Err(ModelError::Training("no feature columns".to_string()));
        }
        info!(
            "Fitting RandomForest on {} samples and {} features",
            x.len(),
            n_features
        );

        let max_features = self
            .config
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize)
            .clamp(1, n_features);
        let config = &self.config;

        self.trees = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let indices: Vec<usize> = if config.bootstrap {
                    (0..x.len()).map(|_| rng.gen_range(0..x.len())).collect()
                } else {
                    (0..x.len()).collect()
                };
                let mut builder = TreeBuilder {
                    x,
                    y,
                    config,
                    max_features,
                    rng,
                };
                builder.build(&indices, 0)
            })
            .collect();
        self.n_features = n_features;

        debug!(trees = self.trees.len(), "RandomForest fit complete");
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<u8, ModelError> {
        let p_up = self.predict_proba(row)?;
        Ok(u8::from(p_up > 0.5))
    }

    fn name(&self) -> &str {
        MODEL_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let v = i as f64;
            x.push(vec![v, (i % 3) as f64]);
            y.push(u8::from(i >= 20));
        }
        (x, y)
    }

    fn small_forest(seed: u64) -> RandomForestModel {
        RandomForestModel::new(ForestConfig {
            n_trees: 25,
            seed,
            ..Default::default()
        })
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(0, 10), 0.0);
        assert_eq!(gini(10, 10), 0.0);
        assert!((gini(5, 10) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_learns_threshold() {
        let (x, y) = separable();
        let mut model = small_forest(42);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 25);
        assert_eq!(model.predict(&[2.0, 0.0]).unwrap(), 0);
        assert_eq!(model.predict(&[37.0, 1.0]).unwrap(), 1);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = separable();
        let mut a = small_forest(7);
        let mut b = small_forest(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        for row in &x {
            assert_eq!(a.predict_proba(row).unwrap(), b.predict_proba(row).unwrap());
        }
    }

    #[test]
    fn test_prediction_thresholds_mean_probability() {
        // Identical rows with mixed labels leave every tree a single impure
        // leaf, so the forest probability is a fraction.
        let x = vec![vec![0.0]; 10];
        let y: Vec<u8> = (0..10).map(|i| (i % 2) as u8).collect();
        let mut model = small_forest(3);
        model.fit(&x, &y).unwrap();

        let p_up = model.predict_proba(&[0.0]).unwrap();
        assert!(p_up > 0.0 && p_up < 1.0);
        assert_eq!(model.predict(&[0.0]).unwrap(), u8::from(p_up > 0.5));
    }

    #[test]
    fn test_unfitted_prediction_fails() {
        let model = small_forest(1);
        assert!(matches!(
            model.predict(&[1.0, 2.0]),
            Err(ModelError::Prediction(_))
        ));
    }

    #[test]
    fn test_feature_length_mismatch() {
        let (x, y) = separable();
        let mut model = small_forest(1);
        model.fit(&x, &y).unwrap();
        assert!(matches!(model.predict(&[1.0]), Err(ModelError::Prediction(_))));
    }

    #[test]
    fn test_single_class_fails() {
        let mut model = small_forest(1);
        let x = vec![vec![1.0], vec![2.0], vec![3.0]];
        assert!(matches!(
            model.fit(&x, &[0, 0, 0]),
            Err(ModelError::Training(_))
        ));
    }
}
