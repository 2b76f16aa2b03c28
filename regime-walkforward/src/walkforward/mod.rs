//! Walk-forward evaluation.
//!
//! Slides a training window over the table one step at a time:
//! - Train: trailing `window_size` rows ending the day before the cursor
//! - Predict: the cursor day only
//! - Retrain: when the active policy says so, or no model is active
//! - Roll: advance by `step_size`

pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;

pub use compare::{compare_policies, ComparisonReport, PairDisagreement, PolicyComparison};
pub use config::WalkForwardConfig;
pub use engine::{
    RunLog, RunParams, SignalRecord, SkipReason, SkippedStep, StepIssue, StepLog,
    WalkForwardEngine, WalkForwardResult,
};
pub use error::WalkForwardError;
pub use output::{OutputPaths, ResultWriter};
