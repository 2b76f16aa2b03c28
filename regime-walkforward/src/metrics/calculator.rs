//! Performance metrics calculator.
//!
//! Works on the per-day signals table of a walk-forward run. Return-based
//! statistics use the strategy's daily P&L; annualisation assumes 252
//! trading days.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::walkforward::SignalRecord;

pub const TRADING_DAYS: f64 = 252.0;

/// Regimes with fewer evaluated days are left out of the breakdown.
pub const MIN_REGIME_DAYS: usize = 5;

/// Days on each side of a regime transition.
pub const TRANSITION_WINDOW: usize = 20;

/// Minimum days required on each side of a transition.
pub const MIN_TRANSITION_DAYS: usize = 3;

/// Tail probability for CVaR.
pub const CVAR_ALPHA: f64 = 0.05;

/// Performance of one regime signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimePerformance {
    pub days: usize,
    pub avg_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub calmar: f64,
}

/// Performance around one regime transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeTransition {
    pub transition_date: NaiveDate,
    pub from_regime: String,
    pub to_regime: String,
    pub before_avg_return: f64,
    pub after_avg_return: f64,
    pub before_max_drawdown: f64,
    pub after_max_drawdown: f64,
}

/// Performance metrics for one signals table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub days: usize,

    // Returns
    pub cumulative_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,

    // Risk-adjusted returns
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    // Risk
    pub max_drawdown: f64,
    pub cvar_5: f64,

    // Signal quality
    pub hit_ratio: f64,
    pub total_trades: usize,
    pub total_costs: f64,

    pub regime_performance: BTreeMap<String, RegimePerformance>,
    pub transitions: Vec<RegimeTransition>,
}

impl PerformanceMetrics {
    /// Generate a summary report.
    pub fn summary(&self) -> String {
        format!(
            "Performance Summary\n\
             ====================\n\
             \n\
             Days: {}\n\
             Trades: {}\n\
             Costs: {:.4}%\n\
             \n\
             Cumulative Return: {:.2}%\n\
             Annualized Return: {:.2}%\n\
             Annualized Volatility: {:.2}%\n\
             \n\
             Max Drawdown: {:.2}%\n\
             CVaR 5%: {:.3}%\n\
             Sharpe Ratio: {:.2}\n\
             Sortino Ratio: {:.2}\n\
             Calmar Ratio: {:.2}\n\
             Hit Ratio: {:.1}%\n\
             \n\
             Regimes: {} (transitions: {})",
            self.days,
            self.total_trades,
            self.total_costs * 100.0,
            self.cumulative_return * 100.0,
            self.annualized_return * 100.0,
            self.annualized_volatility * 100.0,
            self.max_drawdown * 100.0,
            self.cvar_5 * 100.0,
            self.sharpe_ratio,
            self.sortino_ratio,
            self.calmar_ratio,
            self.hit_ratio * 100.0,
            self.regime_performance.len(),
            self.transitions.len()
        )
    }
}

/// Signal agreement between two runs over their common dates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalDisagreement {
    pub common_days: usize,
    pub disagreements: usize,
    pub rate: f64,
}

/// Metrics calculator.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all metrics from a signals table.
    pub fn calculate(signals: &[SignalRecord]) -> PerformanceMetrics {
        if signals.is_empty() {
            return PerformanceMetrics::default();
        }

        let returns: Vec<f64> = signals.iter().map(|s| s.pnl).collect();
        let equity: Vec<f64> = signals.iter().map(|s| s.equity).collect();
        let growth = equity_growth(signals);

        let mut prev = 0;
        let mut total_trades = 0;
        for s in signals {
            if s.signal != prev {
                total_trades += 1;
            }
            prev = s.signal;
        }

        let metrics = PerformanceMetrics {
            days: signals.len(),
            cumulative_return: growth - 1.0,
            annualized_return: annualized_return(growth, signals.len()),
            annualized_volatility: annualized_volatility(&returns),
            sharpe_ratio: sharpe_ratio(&returns),
            sortino_ratio: sortino_ratio(&returns),
            calmar_ratio: calmar_ratio(growth, &equity),
            max_drawdown: max_drawdown(&equity),
            cvar_5: cvar(&returns, CVAR_ALPHA),
            hit_ratio: hit_ratio(signals),
            total_trades,
            total_costs: signals.iter().map(|s| s.trade_cost).sum(),
            regime_performance: Self::regime_performance(signals),
            transitions: Self::transitions(signals),
        };
        debug!(
            days = metrics.days,
            sharpe = metrics.sharpe_ratio,
            "Metrics computed"
        );
        metrics
    }

    /// Per-regime breakdown for regimes with at least `MIN_REGIME_DAYS` days.
    pub fn regime_performance(signals: &[SignalRecord]) -> BTreeMap<String, RegimePerformance> {
        let mut groups: HashMap<&str, Vec<&SignalRecord>> = HashMap::new();
        for s in signals {
            groups.entry(s.regime.as_str()).or_default().push(s);
        }

        groups
            .into_iter()
            .filter(|(_, days)| days.len() >= MIN_REGIME_DAYS)
            .map(|(regime, days)| {
                let returns: Vec<f64> = days.iter().map(|s| s.pnl).collect();
                let equity: Vec<f64> = days.iter().map(|s| s.equity).collect();
                let growth = segment_growth(&equity);
                let perf = RegimePerformance {
                    days: days.len(),
                    avg_return: mean(&returns),
                    sharpe: sharpe_ratio(&returns),
                    max_drawdown: max_drawdown(&equity),
                    calmar: calmar_ratio(growth, &equity),
                };
                (regime.to_string(), perf)
            })
            .collect()
    }

    /// Compare the `TRANSITION_WINDOW` days before and after each change of
    /// regime signature.
    pub fn transitions(signals: &[SignalRecord]) -> Vec<RegimeTransition> {
        let n = signals.len();
        let mut out = Vec::new();

        for idx in 1..n {
            if signals[idx].regime == signals[idx - 1].regime {
                continue;
            }
            let before = &signals[idx.saturating_sub(TRANSITION_WINDOW)..idx];
            // The final row is never part of an after-window.
            let after = &signals[idx..(idx + TRANSITION_WINDOW).min(n - 1)];
            if before.len() < MIN_TRANSITION_DAYS || after.len() < MIN_TRANSITION_DAYS {
                continue;
            }

            let pnl = |rows: &[SignalRecord]| rows.iter().map(|s| s.pnl).collect::<Vec<_>>();
            let eq = |rows: &[SignalRecord]| rows.iter().map(|s| s.equity).collect::<Vec<_>>();
            out.push(RegimeTransition {
                transition_date: signals[idx].date,
                from_regime: signals[idx - 1].regime.clone(),
                to_regime: signals[idx].regime.clone(),
                before_avg_return: mean(&pnl(before)),
                after_avg_return: mean(&pnl(after)),
                before_max_drawdown: max_drawdown(&eq(before)),
                after_max_drawdown: max_drawdown(&eq(after)),
            });
        }
        out
    }

    /// Always-long baseline over the same days, paying `entry_cost` once on
    /// the first day.
    pub fn buy_and_hold(signals: &[SignalRecord], entry_cost: f64) -> Vec<SignalRecord> {
        let mut equity = 1.0;
        signals
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let trade_cost = if i == 0 { entry_cost } else { 0.0 };
                let pnl = s.day_return - trade_cost;
                equity *= 1.0 + pnl;
                SignalRecord {
                    date: s.date,
                    signal: 1,
                    day_return: s.day_return,
                    trade_cost,
                    pnl,
                    equity,
                    regime: s.regime.clone(),
                }
            })
            .collect()
    }

    /// Count days, matched by date, on which two runs held different signals.
    pub fn signal_disagreements(a: &[SignalRecord], b: &[SignalRecord]) -> SignalDisagreement {
        let by_date: HashMap<NaiveDate, i32> = b.iter().map(|s| (s.date, s.signal)).collect();
        let mut common_days = 0;
        let mut disagreements = 0;
        for s in a {
            if let Some(&other) = by_date.get(&s.date) {
                common_days += 1;
                if other != s.signal {
                    disagreements += 1;
                }
            }
        }
        let rate = if common_days > 0 {
            disagreements as f64 / common_days as f64
        } else {
            0.0
        };
        SignalDisagreement {
            common_days,
            disagreements,
            rate,
        }
    }
}

/// Final equity over starting equity. The starting value is recovered from
/// the first day's P&L.
fn equity_growth(signals: &[SignalRecord]) -> f64 {
    let (Some(first), Some(last)) = (signals.first(), signals.last()) else {
        return 1.0;
    };
    let initial = first.equity / (1.0 + first.pnl);
    if initial > 0.0 && initial.is_finite() {
        last.equity / initial
    } else {
        1.0
    }
}

fn segment_growth(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => last / first,
        _ => 1.0,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

pub fn annualized_return(growth: f64, days: usize) -> f64 {
    if days == 0 || growth <= 0.0 {
        return 0.0;
    }
    growth.powf(TRADING_DAYS / days as f64) - 1.0
}

pub fn annualized_volatility(returns: &[f64]) -> f64 {
    TRADING_DAYS.sqrt() * std_dev(returns)
}

fn annualized_mean(returns: &[f64]) -> f64 {
    (1.0 + mean(returns)).powf(TRADING_DAYS) - 1.0
}

pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let vol = annualized_volatility(returns);
    if vol == 0.0 {
        return 0.0;
    }
    annualized_mean(returns) / vol
}

pub fn sortino_ratio(returns: &[f64]) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_vol = TRADING_DAYS.sqrt() * std_dev(&downside);
    if downside_vol == 0.0 {
        return 0.0;
    }
    annualized_mean(returns) / downside_vol
}

/// Most negative peak-to-trough decline, as a fraction (<= 0).
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &e in equity {
        peak = peak.max(e);
        if peak > 0.0 {
            worst = worst.min((e - peak) / peak);
        }
    }
    worst
}

fn calmar_ratio(growth: f64, equity: &[f64]) -> f64 {
    let mdd = max_drawdown(equity).abs();
    if mdd == 0.0 {
        return 0.0;
    }
    annualized_return(growth, equity.len()) / mdd
}

/// Share of days where the previous day's signal times today's return is
/// positive.
pub fn hit_ratio(signals: &[SignalRecord]) -> f64 {
    if signals.len() < 2 {
        return 0.0;
    }
    let correct = signals
        .windows(2)
        .filter(|pair| f64::from(pair[0].signal) * pair[1].day_return > 0.0)
        .count();
    correct as f64 / (signals.len() - 1) as f64
}

/// Quantile with linear interpolation between order statistics.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Mean of returns at or below the `alpha` quantile.
pub fn cvar(returns: &[f64], alpha: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let cutoff = quantile(&sorted, alpha);
    let tail: Vec<f64> = sorted.into_iter().filter(|&r| r <= cutoff).collect();
    mean(&tail)
}
