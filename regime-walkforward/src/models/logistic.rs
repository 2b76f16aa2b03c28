//! Logistic regression for binary direction signals.
//!
//! Features are standardised with the training window's mean and standard
//! deviation; the same transform is applied at prediction time.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::adapter::{check_training_data, ModelAdapter, ModelError};

const MODEL_NAME: &str = "LogisticTradingModel";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticConfig {
    pub learning_rate: f64,
    pub max_iter: usize,
    /// Stop when the log loss improves by less than this.
    pub tolerance: f64,
    /// L2 penalty on the weights (not the bias).
    pub l2: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 1000,
            tolerance: 1e-7,
            l2: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
struct Fitted {
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

#[derive(Debug, Clone)]
pub struct LogisticModel {
    config: LogisticConfig,
    fitted: Option<Fitted>,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let exp_z = z.exp();
        exp_z / (1.0 + exp_z)
    }
}

fn log_loss(y: &[u8], p: &[f64]) -> f64 {
    let eps = 1e-15;
    -y.iter()
        .zip(p)
        .map(|(&label, &prob)| {
            let prob = prob.clamp(eps, 1.0 - eps);
            if label == 1 {
                prob.ln()
            } else {
                (1.0 - prob).ln()
            }
        })
        .sum::<f64>()
        / y.len() as f64
}

impl LogisticModel {
    pub fn new(config: LogisticConfig) -> Self {
        info!(
            "Initialized {} (lr={}, max_iter={})",
            MODEL_NAME, config.learning_rate, config.max_iter
        );
        Self {
            config,
            fitted: None,
        }
    }

    /// Probability of class 1.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, ModelError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ModelError::Prediction("model has not been fitted".to_string()))?;
        if row.len() != fitted.weights.len() {
            return Err(ModelError::Prediction(format!(
                "expected {} features, got {}",
                fitted.weights.len(),
                row.len()
            )));
        }
        let z = row
            .iter()
            .zip(&fitted.means)
            .zip(&fitted.scales)
            .zip(&fitted.weights)
            .map(|(((v, m), s), w)| (v - m) / s * w)
            .sum::<f64>()
            + fitted.bias;
        Ok(sigmoid(z))
    }
}

impl ModelAdapter for LogisticModel {
    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), ModelError> {
        let n_features = check_training_data(x, y)?;
        let n = x.len() as f64;
        info!(
            "Fitting LogisticRegression on {} samples and {} features",
            x.len(),
            n_features
        );

        let means: Vec<f64> = (0..n_features)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        let scales: Vec<f64> = (0..n_features)
            .map(|j| {
                let var = x.iter().map(|row| (row[j] - means[j]).powi(2)).sum::<f64>() / n;
                // Constant columns keep unit scale.
                if var > 1e-24 {
                    var.sqrt()
                } else {
                    1.0
                }
            })
            .collect();
        let z: Vec<Vec<f64>> = x
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&means)
                    .zip(&scales)
                    .map(|((v, m), s)| (v - m) / s)
                    .collect()
            })
            .collect();

        let mut weights = vec![0.0; n_features];
        let mut bias = 0.0;
        let mut prev_loss = f64::INFINITY;
        let mut iterations = 0;

        for iter in 0..self.config.max_iter {
            iterations = iter + 1;
            let probs: Vec<f64> = z
                .iter()
                .map(|row| {
                    sigmoid(row.iter().zip(&weights).map(|(v, w)| v * w).sum::<f64>() + bias)
                })
                .collect();

            let mut dw = vec![0.0; n_features];
            let mut db = 0.0;
            for ((row, &p), &label) in z.iter().zip(&probs).zip(y) {
                let err = p - label as f64;
                for (g, v) in dw.iter_mut().zip(row) {
                    *g += err * v;
                }
                db += err;
            }
            for (w, g) in weights.iter_mut().zip(&dw) {
                *w -= self.config.learning_rate * (g / n + self.config.l2 * *w);
            }
            bias -= self.config.learning_rate * db / n;

            let loss = log_loss(y, &probs);
            if !loss.is_finite() {
                return Err(ModelError::Training("log loss diverged".to_string()));
            }
            if (prev_loss - loss).abs() < self.config.tolerance {
                break;
            }
            prev_loss = loss;
        }

        debug!(iterations, loss = prev_loss, "LogisticRegression fit complete");
        self.fitted = Some(Fitted {
            means,
            scales,
            weights,
            bias,
        });
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<u8, ModelError> {
        Ok(u8::from(self.predict_proba(row)? > 0.5))
    }

    fn name(&self) -> &str {
        MODEL_NAME
    }
}
