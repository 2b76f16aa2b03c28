//! Single-asset portfolio ledger.
//!
//! Equity is mutated only through [`Portfolio::step`], one call per evaluated
//! day in date order. Each step applies `exposure * day_return - trade_cost`
//! as a fractional P&L and compounds it into equity. Exposure is any real
//! position size: 0 flat, 1 fully long, negative short.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Equity after one evaluated day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// A day on which the position changed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub date: NaiveDate,
    pub prev_exposure: f64,
    pub new_exposure: f64,
    pub trade_cost: f64,
    pub equity_before: f64,
    pub equity_after: f64,
}

/// Summary statistics over the equity history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    pub final_equity: f64,
    pub initial_equity: f64,
    pub cumulative_return: f64,
    pub total_trades: usize,
    /// Most negative peak-to-trough decline, as a fraction (<= 0).
    pub max_drawdown: f64,
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_equity: f64,
    equity: f64,
    exposure: f64,
    trade_count: usize,
    equity_history: Vec<EquityPoint>,
    trade_history: Vec<TradeEvent>,
}

impl Portfolio {
    pub fn new(initial_equity: f64) -> Self {
        info!("Portfolio initialized with equity {}", initial_equity);
        Self {
            initial_equity,
            equity: initial_equity,
            exposure: 0.0,
            trade_count: 0,
            equity_history: Vec::new(),
            trade_history: Vec::new(),
        }
    }

    /// Advance one day. Returns `(pnl, new_equity)`.
    pub fn step(
        &mut self,
        date: NaiveDate,
        exposure: f64,
        day_return: f64,
        trade_cost: f64,
    ) -> (f64, f64) {
        let pnl = exposure * day_return - trade_cost;
        let equity_before = self.equity;
        self.equity *= 1.0 + pnl;

        self.equity_history.push(EquityPoint {
            date,
            equity: self.equity,
        });

        if exposure != self.exposure {
            self.trade_count += 1;
            self.trade_history.push(TradeEvent {
                date,
                prev_exposure: self.exposure,
                new_exposure: exposure,
                trade_cost,
                equity_before,
                equity_after: self.equity,
            });
        }
        self.exposure = exposure;

        debug!(
            %date,
            exposure,
            day_return,
            cost = trade_cost,
            pnl,
            equity = self.equity,
            "Portfolio step"
        );
        (pnl, self.equity)
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    /// Exposure held after the last step; 0 before the first.
    pub fn exposure(&self) -> f64 {
        self.exposure
    }

    /// Consume the ledger, returning its histories.
    pub fn into_histories(self) -> (Vec<EquityPoint>, Vec<TradeEvent>) {
        (self.equity_history, self.trade_history)
    }

    pub fn stats(&self) -> PortfolioStats {
        let mut peak = self.initial_equity;
        let mut max_drawdown = 0.0_f64;
        for point in &self.equity_history {
            peak = peak.max(point.equity);
            if peak > 0.0 {
                max_drawdown = max_drawdown.min((point.equity - peak) / peak);
            }
        }

        let cumulative_return = if self.initial_equity > 0.0 {
            self.equity / self.initial_equity - 1.0
        } else {
            0.0
        };

        PortfolioStats {
            final_equity: self.equity,
            initial_equity: self.initial_equity,
            cumulative_return,
            total_trades: self.trade_count,
            max_drawdown,
        }
    }
}
