//! Side-by-side evaluation of retrain policies.
//!
//! Each policy gets its own engine, pool and portfolio; runs share only the
//! read-only table and model factory, so they execute in parallel.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::config::WalkForwardConfig;
use super::engine::{WalkForwardEngine, WalkForwardResult};
use super::error::WalkForwardError;
use crate::data::TimeSeriesTable;
use crate::metrics::{MetricsCalculator, PerformanceMetrics, SignalDisagreement};
use crate::models::ModelFactory;
use crate::policy::PolicyKind;

/// Label used for the always-long baseline.
pub const BUY_AND_HOLD: &str = "buy_and_hold";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairDisagreement {
    pub left: String,
    pub right: String,
    #[serde(flatten)]
    pub counts: SignalDisagreement,
}

/// Metrics per run plus pairwise signal disagreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub metrics: BTreeMap<String, PerformanceMetrics>,
    pub disagreements: Vec<PairDisagreement>,
}

#[derive(Debug, Clone)]
pub struct PolicyComparison {
    pub runs: Vec<(PolicyKind, WalkForwardResult)>,
    pub report: ComparisonReport,
}

/// Run every policy in `policies` over `table` concurrently.
///
/// `factory` overrides the configured model family when given.
pub fn compare_policies(
    config: &WalkForwardConfig,
    table: &TimeSeriesTable,
    policies: &[PolicyKind],
    factory: Option<ModelFactory>,
) -> Result<PolicyComparison, WalkForwardError> {
    info!("Comparing {} policies", policies.len());

    let runs = policies
        .par_iter()
        .map(|&kind| {
            let mut config = config.clone();
            config.policy = kind;
            let mut engine = WalkForwardEngine::new(config)?;
            if let Some(factory) = &factory {
                engine = engine.with_model_factory(factory.clone());
            }
            Ok((kind, engine.run(table)?))
        })
        .collect::<Result<Vec<_>, WalkForwardError>>()?;

    let report = build_report(&runs, config.costs.base_rate);
    Ok(PolicyComparison { runs, report })
}

fn build_report(runs: &[(PolicyKind, WalkForwardResult)], entry_cost: f64) -> ComparisonReport {
    let mut metrics: BTreeMap<String, PerformanceMetrics> = runs
        .iter()
        .map(|(kind, result)| {
            (
                kind.to_string(),
                MetricsCalculator::calculate(&result.signals),
            )
        })
        .collect();

    // Every policy evaluates the same days, so any run serves as template.
    if let Some((_, first)) = runs.first() {
        let baseline = MetricsCalculator::buy_and_hold(&first.signals, entry_cost);
        metrics.insert(
            BUY_AND_HOLD.to_string(),
            MetricsCalculator::calculate(&baseline),
        );
    }

    let mut disagreements = Vec::new();
    for (i, (left_kind, left)) in runs.iter().enumerate() {
        for (right_kind, right) in &runs[i + 1..] {
            let counts = MetricsCalculator::signal_disagreements(&left.signals, &right.signals);
            info!(
                "{} vs {}: {} of {} days differ",
                left_kind, right_kind, counts.disagreements, counts.common_days
            );
            disagreements.push(PairDisagreement {
                left: left_kind.to_string(),
                right: right_kind.to_string(),
                counts,
            });
        }
    }

    ComparisonReport {
        metrics,
        disagreements,
    }
}
