//! Retrain policies and the pool of fitted models they select from.

pub mod pool;
pub mod retrain;

pub use pool::{ModelPool, PoolSlot};
pub use retrain::{HybridPolicy, PolicyKind, RegimeSpecificPolicy, RetrainPolicy, StaticPolicy};
