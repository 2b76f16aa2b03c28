//! Classifier capability used by the walk-forward engine.

use std::fmt;
use std::sync::Arc;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::forest::{ForestConfig, RandomForestModel};
use super::logistic::{LogisticConfig, LogisticModel};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Training failed: {0}")]
    Training(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

/// A binary classifier that can be refit on a training window and asked for
/// a 0/1 signal on a single feature row.
pub trait ModelAdapter: Send + Sync {
    /// Fit on a row-major feature matrix and binary targets.
    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), ModelError>;

    /// Predict the signal (1 = long, 0 = flat) for one row.
    fn predict(&self, row: &[f64]) -> Result<u8, ModelError>;

    /// Display name recorded in the run log.
    fn name(&self) -> &str;
}

/// Builds a fresh, unfitted adapter. Shared across concurrent runs.
pub type ModelFactory = Arc<dyn Fn() -> Box<dyn ModelAdapter> + Send + Sync>;

/// Built-in classifier families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    RandomForest,
    Logistic,
}

impl ModelKind {
    /// Factory producing adapters of this kind seeded with `seed`.
    pub fn factory(self, seed: u64) -> ModelFactory {
        match self {
            ModelKind::RandomForest => Arc::new(move || {
                Box::new(RandomForestModel::new(ForestConfig {
                    seed,
                    ..Default::default()
                })) as Box<dyn ModelAdapter>
            }),
            ModelKind::Logistic => Arc::new(|| {
                Box::new(LogisticModel::new(LogisticConfig::default())) as Box<dyn ModelAdapter>
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::Logistic => "logistic",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject training data the classifiers cannot learn from.
pub(crate) fn check_training_data(x: &[Vec<f64>], y: &[u8]) -> Result<usize, ModelError> {
    if x.is_empty() {
        return Err(ModelError::Training("empty training set".to_string()));
    }
    if x.len() != y.len() {
        return Err(ModelError::Training(format!(
            "{} rows but {} targets",
            x.len(),
            y.len()
        )));
    }
    let n_features = x[0].len();
    if x.iter().any(|row| row.len() != n_features) {
        return Err(ModelError::Training("ragged feature matrix".to_string()));
    }
    if y.iter().any(|&label| label > 1) {
        return Err(ModelError::Training("targets must be 0 or 1".to_string()));
    }
    let positives = y.iter().filter(|&&label| label == 1).count();
    if positives == 0 || positives == y.len() {
        return Err(ModelError::Training(
            "training targets contain a single class".to_string(),
        ));
    }
    Ok(n_features)
}
