//! Walk-forward backtest engine.
//!
//! Runs the evaluation loop over a date-ordered table:
//! 1. Slice the trailing training window ending the day before the cursor
//! 2. Detect a regime change at the end of the window
//! 3. Ask the retrain policy whether to refit, and fit into the pool
//! 4. Predict the cursor day's signal with the active model
//! 5. Charge transaction costs and step the portfolio
//! 6. Record signal, equity and a structured step log

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::WalkForwardConfig;
use super::error::WalkForwardError;
use crate::backtest::{EquityPoint, Portfolio, PortfolioStats, TradeEvent};
use crate::data::TimeSeriesTable;
use crate::models::ModelFactory;
use crate::policy::{ModelPool, RetrainPolicy};
use crate::regime::{regime_changed, RegimeKey};

/// One evaluated day, as written to the signals table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub date: NaiveDate,
    pub signal: i32,
    pub day_return: f64,
    pub trade_cost: f64,
    pub pnl: f64,
    pub equity: f64,
    /// Rendered regime signature at the end of the training window.
    pub regime: String,
}

/// Non-fatal condition encountered while evaluating a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepIssue {
    /// A refit was due but the training targets had a single class.
    InsufficientClasses,
    /// The adapter rejected the training data.
    TrainingFailed { message: String },
    /// The active model failed to predict; the signal fell back to 0.
    PredictionFailed { message: String },
}

/// Why a cursor position produced no output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    InsufficientData { available: usize, required: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedStep {
    pub index: usize,
    pub date: NaiveDate,
    pub reason: SkipReason,
}

/// Structured log record for one evaluated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepLog {
    pub index: usize,
    pub date: NaiveDate,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub retrained: bool,
    pub regime_changed: bool,
    pub regime_signature: String,
    pub signal: i32,
    pub prev_signal: i32,
    pub day_return: f64,
    pub trade_cost: f64,
    pub pnl: f64,
    pub equity: f64,
    pub model_used: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<StepIssue>,
}

/// Parameters a run was executed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub ticker: String,
    pub window_size: usize,
    pub retrain_interval: usize,
    pub model_type: String,
    pub policy: String,
    pub horizon: usize,
    pub step_size: usize,
    pub min_train_samples: usize,
    pub seed: u64,
    pub transaction_cost: f64,
    pub slippage_rate: f64,
    pub min_cost: f64,
    pub initial_equity: f64,
    pub regime_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub params: RunParams,
    pub runs: Vec<StepLog>,
    pub skipped: Vec<SkippedStep>,
}

/// Result of a completed walk-forward run.
#[derive(Debug, Clone)]
pub struct WalkForwardResult {
    pub signals: Vec<SignalRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<TradeEvent>,
    pub log: RunLog,
    pub final_equity: f64,
    pub stats: PortfolioStats,
}

impl WalkForwardResult {
    /// Cursor indices at which a model was fitted.
    pub fn retrain_indices(&self) -> Vec<usize> {
        self.log
            .runs
            .iter()
            .filter(|step| step.retrained)
            .map(|step| step.index)
            .collect()
    }
}

pub struct WalkForwardEngine {
    config: WalkForwardConfig,
    policy: Box<dyn RetrainPolicy>,
    factory: ModelFactory,
}

impl WalkForwardEngine {
    /// Build an engine from a validated configuration, using the configured
    /// policy and model family.
    pub fn new(config: WalkForwardConfig) -> Result<Self, WalkForwardError> {
        config.validate()?;
        let policy = config.policy.build();
        let factory = config.model.factory(config.seed);
        Ok(Self {
            config,
            policy,
            factory,
        })
    }

    /// Replace the model factory.
    pub fn with_model_factory(mut self, factory: ModelFactory) -> Self {
        self.factory = factory;
        self
    }

    fn params(&self, regime_columns: &[String]) -> RunParams {
        let c = &self.config;
        RunParams {
            ticker: c.ticker.clone(),
            window_size: c.window_size,
            retrain_interval: c.retrain_interval,
            model_type: c.model.to_string(),
            policy: self.policy.name().to_string(),
            horizon: c.horizon,
            step_size: c.step_size,
            min_train_samples: c.min_train_samples,
            seed: c.seed,
            transaction_cost: c.costs.base_rate,
            slippage_rate: c.costs.slippage_rate,
            min_cost: c.costs.min_cost,
            initial_equity: c.initial_equity,
            regime_columns: regime_columns.to_vec(),
        }
    }

    /// Run the walk-forward loop over `table`.
    pub fn run(&self, table: &TimeSeriesTable) -> Result<WalkForwardResult, WalkForwardError> {
        if table.feature_names().is_empty() {
            return Err(WalkForwardError::Configuration(
                "No feature columns detected".to_string(),
            ));
        }

        let cfg = &self.config;
        let regime_columns = cfg.layout().regime_columns;
        let n = table.len();
        let window = cfg.window_size;

        info!(
            "Starting walk-forward: {} samples, window={}, interval={}, policy={}",
            n,
            window,
            cfg.retrain_interval,
            self.policy.name()
        );
        if n <= window {
            warn!(
                "Table has {} rows, not more than the {}-row window; nothing to evaluate",
                n, window
            );
        }

        let mut pool = ModelPool::new();
        let mut portfolio = Portfolio::new(cfg.initial_equity);
        let mut signals = Vec::new();
        let mut runs = Vec::new();
        let mut skipped = Vec::new();

        let mut last_retrain = window - 1;
        let mut last_signal = 0;
        let mut i = window;

        while i + cfg.horizon - 1 < n {
            let train_end = i - 1;
            let train_start = train_end.saturating_sub(window - 1);
            let available = train_end - train_start + 1;

            if available < cfg.min_train_samples {
                warn!(
                    "Skipping index {}, not enough training samples: {}",
                    i, available
                );
                skipped.push(SkippedStep {
                    index: i,
                    date: table.date(i),
                    reason: SkipReason::InsufficientData {
                        available,
                        required: cfg.min_train_samples,
                    },
                });
                i += cfg.step_size;
                continue;
            }

            let changed = regime_changed(table, train_end, &regime_columns);
            let key = RegimeKey::from_row(&table.row(train_end), &regime_columns);
            let steps_since = train_end - last_retrain;
            let mut issues = Vec::new();

            let has_model = self.policy.select_model(&pool, &key).is_some();
            let fit_due = self
                .policy
                .should_retrain(changed, steps_since, cfg.retrain_interval)
                || !has_model;

            let mut retrained = false;
            if fit_due {
                let (x, y) = table.training_slice(train_start, train_end);
                let has_both_classes = y.iter().any(|&t| t == 0) && y.iter().any(|&t| t == 1);
                if !has_both_classes {
                    warn!(
                        "Not enough classes in training slice for regime {} at idx {}. Skipping retrain.",
                        key, train_end
                    );
                    issues.push(StepIssue::InsufficientClasses);
                } else {
                    let mut model = (self.factory)();
                    match model.fit(&x, &y) {
                        Ok(()) => {
                            let slot = self.policy.slot(&key);
                            pool.insert(slot.clone(), model);
                            last_retrain = train_end;
                            retrained = true;
                            info!(
                                "Trained model at idx {} into {} (regime_changed={}, steps_since={}, pooled={})",
                                train_end,
                                slot,
                                changed,
                                steps_since,
                                pool.len()
                            );
                        }
                        Err(e) => {
                            warn!("Fit failed at idx {}: {}", train_end, e);
                            issues.push(StepIssue::TrainingFailed {
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }

            let model = self.policy.select_model(&pool, &key);
            let signal = match model {
                None => 0,
                Some(m) => match m.predict(&table.feature_row(i)) {
                    Ok(label) => i32::from(label),
                    Err(e) => {
                        warn!("Prediction error at idx {}: {}", i, e);
                        issues.push(StepIssue::PredictionFailed {
                            message: e.to_string(),
                        });
                        0
                    }
                },
            };
            let model_used = model.map(|m| m.name().to_string());

            let date = table.date(i);
            let day_return = table.day_return(i);
            let prev_signal = last_signal;
            let trade_cost = cfg.costs.compute_trade_cost(
                portfolio.exposure(),
                f64::from(signal),
                portfolio.equity(),
            );
            let (pnl, equity) = portfolio.step(date, f64::from(signal), day_return, trade_cost);
            last_signal = signal;

            let regime = key.to_string();
            debug!(
                %date,
                signal,
                retrained,
                regime_changed = changed,
                regime = %regime,
                "Walk-forward step"
            );

            signals.push(SignalRecord {
                date,
                signal,
                day_return,
                trade_cost,
                pnl,
                equity,
                regime: regime.clone(),
            });
            runs.push(StepLog {
                index: i,
                date,
                train_start: table.date(train_start),
                train_end: table.date(train_end),
                retrained,
                regime_changed: changed,
                regime_signature: regime,
                signal,
                prev_signal,
                day_return,
                trade_cost,
                pnl,
                equity,
                model_used,
                issues,
            });

            i += cfg.step_size;
        }

        let stats = portfolio.stats();
        let final_equity = portfolio.equity();
        info!(
            "Walk-forward complete: {} days evaluated, {} skipped, {} trades, final equity {:.6}",
            signals.len(),
            skipped.len(),
            stats.total_trades,
            final_equity
        );

        let (equity_curve, trades) = portfolio.into_histories();
        Ok(WalkForwardResult {
            signals,
            equity_curve,
            trades,
            log: RunLog {
                params: self.params(&regime_columns),
                runs,
                skipped,
            },
            final_equity,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{ModelAdapter, ModelError};
    use crate::policy::PolicyKind;

    /// Predicts the sign of the first feature.
    struct SignModel;

    impl ModelAdapter for SignModel {
        fn fit(&mut self, _x: &[Vec<f64>], _y: &[u8]) -> Result<(), ModelError> {
            Ok(())
        }

        fn predict(&self, row: &[f64]) -> Result<u8, ModelError> {
            Ok(u8::from(row[0] > 0.0))
        }

        fn name(&self) -> &str {
            "sign"
        }
    }

    fn table(n: usize, targets: Vec<i64>, feature: Vec<f64>) -> TimeSeriesTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        TimeSeriesTable::new(dates, vec![0.01; n], targets)
            .unwrap()
            .with_feature("SPY_F", feature)
            .unwrap()
    }

    fn config(window: usize, min: usize) -> WalkForwardConfig {
        WalkForwardConfig {
            window_size: window,
            retrain_interval: window,
            min_train_samples: min,
            policy: PolicyKind::Static,
            ..WalkForwardConfig::default()
        }
    }

    fn engine(config: WalkForwardConfig) -> WalkForwardEngine {
        WalkForwardEngine::new(config)
            .unwrap()
            .with_model_factory(Arc::new(|| Box::new(SignModel) as Box<dyn ModelAdapter>))
    }

    #[test]
    fn test_cursor_range() {
        let t = table(8, vec![0, 1, 0, 1, 0, 1, 0, 1], vec![1.0; 8]);
        let result = engine(config(5, 3)).run(&t).unwrap();
        let indices: Vec<usize> = result.log.runs.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![5, 6, 7]);
        assert_eq!(result.log.runs[0].train_start, t.date(0));
        assert_eq!(result.log.runs[0].train_end, t.date(4));
    }

    #[test]
    fn test_horizon_shortens_range() {
        let t = table(8, vec![0, 1, 0, 1, 0, 1, 0, 1], vec![1.0; 8]);
        let mut cfg = config(5, 3);
        cfg.horizon = 2;
        let result = engine(cfg).run(&t).unwrap();
        assert_eq!(result.signals.len(), 2);
    }

    #[test]
    fn test_short_table_evaluates_nothing() {
        let t = table(5, vec![0, 1, 0, 1, 0], vec![1.0; 5]);
        let result = engine(config(5, 3)).run(&t).unwrap();
        assert!(result.signals.is_empty());
        assert_eq!(result.final_equity, 1.0);
    }

    #[test]
    fn test_no_features_is_fatal() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..3).map(|i| start + chrono::Duration::days(i)).collect();
        let t = TimeSeriesTable::new(dates, vec![0.0; 3], vec![0, 1, 0]).unwrap();
        let err = engine(config(1, 1)).run(&t).unwrap_err();
        assert!(matches!(err, WalkForwardError::Configuration(_)));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut cfg = config(5, 3);
        cfg.step_size = 0;
        assert!(matches!(
            WalkForwardEngine::new(cfg),
            Err(WalkForwardError::Configuration(_))
        ));
    }

    #[test]
    fn test_single_class_window_leaves_no_model() {
        let t = table(7, vec![1; 7], vec![1.0; 7]);
        let result = engine(config(5, 3)).run(&t).unwrap();
        assert!(result.retrain_indices().is_empty());
        for step in &result.log.runs {
            assert_eq!(step.signal, 0);
            assert_eq!(step.model_used, None);
            assert_eq!(step.issues, vec![StepIssue::InsufficientClasses]);
        }
    }

    #[test]
    fn test_params_recorded() {
        let t = table(6, vec![0, 1, 0, 1, 0, 1], vec![1.0; 6]);
        let result = engine(config(5, 3)).run(&t).unwrap();
        let params = &result.log.params;
        assert_eq!(params.policy, "static");
        assert_eq!(params.window_size, 5);
        assert_eq!(params.transaction_cost, 0.0005);
        assert_eq!(
            params.regime_columns,
            vec!["SPY_HMM_Regime".to_string(), "SPY_CP_Regime".to_string()]
        );
    }
}
