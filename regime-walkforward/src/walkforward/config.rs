//! Walk-forward run configuration.
//!
//! Loadable from TOML; every field has a default so a partial file only
//! overrides what it names. Column names left unset derive from `ticker`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::WalkForwardError;
use crate::backtest::TransactionCostModel;
use crate::data::{ColumnLayout, DataLoader, TimeSeriesTable};
use crate::models::ModelKind;
use crate::policy::PolicyKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Asset identifier, also the column prefix.
    pub ticker: String,

    /// Training window length in rows.
    pub window_size: usize,

    /// Maximum steps between refits.
    pub retrain_interval: usize,

    /// Prediction horizon. Only the first day is traded.
    pub horizon: usize,

    /// Cursor advance per step.
    pub step_size: usize,

    pub policy: PolicyKind,

    pub model: ModelKind,

    /// Training slices shorter than this are skipped.
    pub min_train_samples: usize,

    /// Seed passed to model construction.
    pub seed: u64,

    /// Starting equity.
    pub initial_equity: f64,

    pub costs: TransactionCostModel,

    /// Signature columns, in order. Defaults to HMM then changepoint labels.
    pub regime_columns: Option<Vec<String>>,

    pub target_column: Option<String>,

    pub return_column: Option<String>,

    pub feature_prefix: Option<String>,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self::for_ticker("SPY")
    }
}

impl WalkForwardConfig {
    pub fn for_ticker(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            window_size: 750,
            retrain_interval: 750,
            horizon: 1,
            step_size: 1,
            policy: PolicyKind::Hybrid,
            model: ModelKind::RandomForest,
            min_train_samples: 50,
            seed: 42,
            initial_equity: 1.0,
            costs: TransactionCostModel::default(),
            regime_columns: None,
            target_column: None,
            return_column: None,
            feature_prefix: None,
        }
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, WalkForwardError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, WalkForwardError> {
        toml::from_str(contents)
            .map_err(|e| WalkForwardError::Configuration(format!("Invalid TOML: {}", e)))
    }

    /// Column layout with explicit overrides applied on top of the ticker
    /// defaults.
    pub fn layout(&self) -> ColumnLayout {
        let mut layout = ColumnLayout::for_ticker(&self.ticker);
        if let Some(columns) = &self.regime_columns {
            layout.regime_columns = columns.clone();
        }
        if let Some(target) = &self.target_column {
            layout.target_column = target.clone();
        }
        if let Some(ret) = &self.return_column {
            layout.return_column = ret.clone();
        }
        if let Some(prefix) = &self.feature_prefix {
            layout.feature_prefix = prefix.clone();
        }
        layout
    }

    /// Load the feature table at `path` under this configuration's layout.
    pub fn load_table(&self, path: &Path) -> Result<TimeSeriesTable, WalkForwardError> {
        Ok(DataLoader::load_features(path, &self.layout())?)
    }

    pub fn validate(&self) -> Result<(), WalkForwardError> {
        let invalid = |msg: &str| Err(WalkForwardError::Configuration(msg.to_string()));

        if self.window_size == 0 {
            return invalid("window_size must be positive");
        }
        if self.step_size == 0 {
            return invalid("step_size must be positive");
        }
        if self.horizon == 0 {
            return invalid("horizon must be positive");
        }
        if self.retrain_interval == 0 {
            return invalid("retrain_interval must be positive");
        }
        if self.initial_equity.is_nan() || self.initial_equity <= 0.0 {
            return invalid("initial_equity must be positive");
        }
        let costs = &self.costs;
        if costs.base_rate < 0.0 || costs.slippage_rate < 0.0 || costs.min_cost < 0.0 {
            return invalid("transaction cost rates must be non-negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WalkForwardConfig::default();
        assert_eq!(config.ticker, "SPY");
        assert_eq!(config.window_size, 750);
        assert_eq!(config.retrain_interval, 750);
        assert_eq!(config.min_train_samples, 50);
        assert_eq!(config.policy, PolicyKind::Hybrid);
        assert_eq!(config.costs.base_rate, 0.0005);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layout_follows_ticker() {
        let config = WalkForwardConfig::for_ticker("QQQ");
        let layout = config.layout();
        assert_eq!(layout.target_column, "QQQ_Target");
        assert_eq!(
            layout.regime_columns,
            vec!["QQQ_HMM_Regime".to_string(), "QQQ_CP_Regime".to_string()]
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = WalkForwardConfig::from_toml_str(
            r#"
            ticker = "BTC"
            window_size = 250
            policy = "regime_specific"
            model = "logistic"
            regime_columns = ["BTC_HMM_Regime"]

            [costs]
            base_rate = 0.001
            "#,
        )
        .unwrap();

        assert_eq!(config.window_size, 250);
        assert_eq!(config.retrain_interval, 750);
        assert_eq!(config.policy, PolicyKind::RegimeSpecific);
        assert_eq!(config.model, ModelKind::Logistic);
        assert_eq!(config.costs.base_rate, 0.001);
        assert_eq!(config.costs.slippage_rate, 0.0);

        let layout = config.layout();
        assert_eq!(layout.regime_columns, vec!["BTC_HMM_Regime".to_string()]);
        assert_eq!(layout.return_column, "BTC_Return");
    }

    #[test]
    fn test_invalid_toml() {
        let err = WalkForwardConfig::from_toml_str("window_size = \"big\"").unwrap_err();
        assert!(matches!(err, WalkForwardError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let cases: Vec<Box<dyn Fn(&mut WalkForwardConfig)>> = vec![
            Box::new(|c| c.window_size = 0),
            Box::new(|c| c.step_size = 0),
            Box::new(|c| c.horizon = 0),
            Box::new(|c| c.retrain_interval = 0),
            Box::new(|c| c.initial_equity = 0.0),
            Box::new(|c| c.costs.base_rate = -0.1),
            Box::new(|c| c.costs.min_cost = -1.0),
        ];
        for mutate in cases {
            let mut config = WalkForwardConfig::default();
            mutate(&mut config);
            assert!(matches!(
                config.validate(),
                Err(WalkForwardError::Configuration(_))
            ));
        }
    }
}
