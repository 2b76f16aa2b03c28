//! Transaction cost model.
//!
//! Costs are fractions of portfolio notional, charged only when exposure
//! changes. Default: 5 bps per unit of position change, no slippage, no floor.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configurable transaction cost model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionCostModel {
    /// Linear cost per unit of absolute position change.
    pub base_rate: f64,
    /// Extra slippage per unit of absolute position change.
    pub slippage_rate: f64,
    /// Minimum absolute cost per trade (0 = no floor).
    pub min_cost: f64,
}

impl Default for TransactionCostModel {
    fn default() -> Self {
        Self {
            base_rate: 0.0005,
            slippage_rate: 0.0,
            min_cost: 0.0,
        }
    }
}

impl TransactionCostModel {
    /// Cost, as a fraction of notional, of moving from `prev_position` to
    /// `new_position`.
    pub fn compute_trade_cost(&self, prev_position: f64, new_position: f64, notional: f64) -> f64 {
        if prev_position == new_position {
            return 0.0;
        }
        let change = (new_position - prev_position).abs();
        let mut cost = self.base_rate * change + self.slippage_rate * change;

        // The floor is absolute, so it shrinks as a fraction of a larger book.
        if self.min_cost > 0.0 && notional > 0.0 {
            cost = cost.max(self.min_cost / notional);
        }

        debug!(
            prev = prev_position,
            new = new_position,
            change,
            cost,
            "Trade cost computed"
        );
        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rates() {
        let model = TransactionCostModel::default();
        assert_eq!(model.base_rate, 0.0005);
        assert_eq!(model.slippage_rate, 0.0);
        assert_eq!(model.min_cost, 0.0);
    }

    #[test]
    fn test_no_change_is_free() {
        let model = TransactionCostModel {
            base_rate: 0.01,
            slippage_rate: 0.01,
            min_cost: 5.0,
        };
        assert_eq!(model.compute_trade_cost(1.0, 1.0, 100.0), 0.0);
        assert_eq!(model.compute_trade_cost(0.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_linear_in_change() {
        let model = TransactionCostModel {
            base_rate: 0.001,
            slippage_rate: 0.0005,
            min_cost: 0.0,
        };
        assert!((model.compute_trade_cost(0.0, 1.0, 1.0) - 0.0015).abs() < 1e-12);
        assert!((model.compute_trade_cost(1.0, 0.0, 1.0) - 0.0015).abs() < 1e-12);
        assert!((model.compute_trade_cost(-1.0, 1.0, 1.0) - 0.003).abs() < 1e-12);
    }

    #[test]
    fn test_min_cost_floor() {
        let model = TransactionCostModel {
            base_rate: 0.0001,
            slippage_rate: 0.0,
            min_cost: 0.01,
        };
        // 0.01 / 2.0 = 0.005 beats the 1 bp linear cost.
        assert!((model.compute_trade_cost(0.0, 1.0, 2.0) - 0.005).abs() < 1e-12);
        // Non-positive notional disables the floor.
        assert!((model.compute_trade_cost(0.0, 1.0, 0.0) - 0.0001).abs() < 1e-12);
    }
}
