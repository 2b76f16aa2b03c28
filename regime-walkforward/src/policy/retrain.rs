//! Retrain scheduling policies.
//!
//! A policy answers two questions at every evaluated step: is a refit due,
//! and which pooled model (if any) is active for the current regime.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::pool::{ModelPool, PoolSlot};
use crate::models::ModelAdapter;
use crate::regime::RegimeKey;

pub trait RetrainPolicy: Send + Sync {
    /// Stable identifier recorded in the run log.
    fn name(&self) -> &'static str;

    /// Whether a refit is due at this step.
    fn should_retrain(
        &self,
        regime_changed: bool,
        steps_since_retrain: usize,
        interval: usize,
    ) -> bool;

    /// Pool slot a model fitted for `key` is stored under.
    fn slot(&self, key: &RegimeKey) -> PoolSlot;

    /// Model active for `key`, `None` if that slot has never been fitted.
    fn select_model<'p>(
        &self,
        pool: &'p ModelPool,
        key: &RegimeKey,
    ) -> Option<&'p dyn ModelAdapter> {
        pool.get(&self.slot(key))
    }
}

/// Refit on a fixed schedule, ignoring regime changes. One global model.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPolicy;

impl RetrainPolicy for StaticPolicy {
    fn name(&self) -> &'static str {
        "static"
    }

    fn should_retrain(
        &self,
        _regime_changed: bool,
        steps_since_retrain: usize,
        interval: usize,
    ) -> bool {
        steps_since_retrain >= interval
    }

    fn slot(&self, _key: &RegimeKey) -> PoolSlot {
        PoolSlot::Global
    }
}

/// One model per regime signature, refit on regime change or schedule.
/// An unseen signature has no active model, which forces a fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegimeSpecificPolicy;

impl RetrainPolicy for RegimeSpecificPolicy {
    fn name(&self) -> &'static str {
        "regime_specific"
    }

    fn should_retrain(
        &self,
        regime_changed: bool,
        steps_since_retrain: usize,
        interval: usize,
    ) -> bool {
        regime_changed || steps_since_retrain >= interval
    }

    fn slot(&self, key: &RegimeKey) -> PoolSlot {
        PoolSlot::Regime(key.clone())
    }
}

/// Global model, refit immediately on any regime change and otherwise on
/// schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridPolicy;

impl RetrainPolicy for HybridPolicy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn should_retrain(
        &self,
        regime_changed: bool,
        steps_since_retrain: usize,
        interval: usize,
    ) -> bool {
        if regime_changed {
            return true;
        }
        steps_since_retrain >= interval
    }

    fn slot(&self, _key: &RegimeKey) -> PoolSlot {
        PoolSlot::Global
    }
}

/// Policy selector for configuration and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum PolicyKind {
    Static,
    RegimeSpecific,
    #[default]
    Hybrid,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 3] = [
        PolicyKind::Static,
        PolicyKind::RegimeSpecific,
        PolicyKind::Hybrid,
    ];

    pub fn build(self) -> Box<dyn RetrainPolicy> {
        match self {
            PolicyKind::Static => Box::new(StaticPolicy),
            PolicyKind::RegimeSpecific => Box::new(RegimeSpecificPolicy),
            PolicyKind::Hybrid => Box::new(HybridPolicy),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Static => "static",
            PolicyKind::RegimeSpecific => "regime_specific",
            PolicyKind::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelError;

    struct Stub;

    impl ModelAdapter for Stub {
        fn fit(&mut self, _x: &[Vec<f64>], _y: &[u8]) -> Result<(), ModelError> {
            Ok(())
        }

        fn predict(&self, _row: &[f64]) -> Result<u8, ModelError> {
            Ok(1)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    fn key(label: i64) -> RegimeKey {
        RegimeKey::new(vec![Some(label)])
    }

    #[test]
    fn test_static_ignores_regime_change() {
        let p = StaticPolicy;
        assert!(!p.should_retrain(true, 0, 5));
        assert!(!p.should_retrain(true, 4, 5));
        assert!(p.should_retrain(false, 5, 5));
        assert!(p.should_retrain(true, 6, 5));
    }

    #[test]
    fn test_regime_specific_retrains_on_change_or_schedule() {
        let p = RegimeSpecificPolicy;
        assert!(p.should_retrain(true, 0, 5));
        assert!(p.should_retrain(false, 5, 5));
        assert!(!p.should_retrain(false, 4, 5));
    }

    #[test]
    fn test_hybrid_change_takes_priority() {
        let p = HybridPolicy;
        assert!(p.should_retrain(true, 0, 1000));
        assert!(!p.should_retrain(false, 999, 1000));
        assert!(p.should_retrain(false, 1000, 1000));
    }

    #[test]
    fn test_regime_specific_selects_by_signature() {
        let p = RegimeSpecificPolicy;
        let mut pool = ModelPool::new();
        pool.insert(p.slot(&key(0)), Box::new(Stub));

        assert!(p.select_model(&pool, &key(0)).is_some());
        assert!(p.select_model(&pool, &key(1)).is_none());
    }

    #[test]
    fn test_global_policies_share_one_model() {
        let mut pool = ModelPool::new();
        pool.insert(PoolSlot::Global, Box::new(Stub));
        for policy in [PolicyKind::Static, PolicyKind::Hybrid] {
            let p = policy.build();
            assert!(p.select_model(&pool, &key(0)).is_some());
            assert!(p.select_model(&pool, &key(7)).is_some());
        }
    }

    #[test]
    fn test_kind_names_match_policies() {
        for kind in PolicyKind::ALL {
            assert_eq!(kind.build().name(), kind.as_str());
        }
        assert_eq!(PolicyKind::default(), PolicyKind::Hybrid);
    }
}
