//! Portfolio accounting for walk-forward signals.
//!
//! - Transaction costs charged on position changes
//! - Single-asset equity ledger with trade log

pub mod costs;
pub mod portfolio;

pub use costs::TransactionCostModel;
pub use portfolio::{EquityPoint, Portfolio, PortfolioStats, TradeEvent};
