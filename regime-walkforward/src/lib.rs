pub mod backtest;
pub mod data;
pub mod metrics;
pub mod models;
pub mod policy;
pub mod regime;
pub mod walkforward;

// Re-export commonly used types
pub use backtest::{Portfolio, PortfolioStats, TransactionCostModel};
pub use data::{ColumnLayout, DataLoader, TimeSeriesTable};
pub use metrics::{MetricsCalculator, PerformanceMetrics};
pub use models::{ModelAdapter, ModelError, ModelFactory, ModelKind};
pub use policy::{ModelPool, PolicyKind, RetrainPolicy};
pub use regime::{regime_changed, regime_signature, RegimeKey};
pub use walkforward::{
    ResultWriter, SignalRecord, WalkForwardConfig, WalkForwardEngine, WalkForwardError,
    WalkForwardResult,
};
