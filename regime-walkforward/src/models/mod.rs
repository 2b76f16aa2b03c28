//! Binary direction classifiers.
//!
//! The engine only sees [`ModelAdapter`]; the concrete forest and logistic
//! models exist so the binary runs end to end.

pub mod adapter;
pub mod forest;
pub mod logistic;

pub use adapter::{ModelAdapter, ModelError, ModelFactory, ModelKind};
pub use forest::{ForestConfig, RandomForestModel};
pub use logistic::{LogisticConfig, LogisticModel};
