//! Regime signature and change detection.
//!
//! Regime labels come from external models (HMM states, changepoint
//! segments). The engine treats them as opaque: a row's signature is the
//! ordered tuple of its labels, and a regime change is any difference
//! between consecutive signatures.

pub mod signature;

pub use signature::{regime_changed, regime_signature, RegimeKey, MISSING_LABEL};
