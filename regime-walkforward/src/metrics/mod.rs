//! Performance metrics module.
//!
//! Provides performance calculations over a signals table:
//! - Cumulative and annualized return, volatility
//! - Sharpe, Sortino and Calmar ratios
//! - Maximum drawdown, CVaR
//! - Hit ratio, per-regime and regime-transition breakdowns
//! - Buy-and-hold baseline and signal disagreement counts

pub mod calculator;

pub use calculator::{
    MetricsCalculator, PerformanceMetrics, RegimePerformance, RegimeTransition,
    SignalDisagreement,
};
