//! Fitted-model storage.
//!
//! Models live in an arena; a slot map points each key at its arena entry.
//! Refitting a slot overwrites its entry in place, so the arena never holds
//! unreachable models.

use std::collections::HashMap;
use std::fmt;

use crate::models::ModelAdapter;
use crate::regime::RegimeKey;

/// Key under which a fitted model is stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolSlot {
    /// The single model shared across all regimes.
    Global,
    /// A model dedicated to one regime signature.
    Regime(RegimeKey),
}

impl fmt::Display for PoolSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolSlot::Global => f.write_str("global"),
            PoolSlot::Regime(key) => write!(f, "regime[{}]", key),
        }
    }
}

#[derive(Default)]
pub struct ModelPool {
    models: Vec<Box<dyn ModelAdapter>>,
    index: HashMap<PoolSlot, usize>,
}

impl ModelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fitted model under `slot`, replacing any previous occupant.
    /// Returns the arena index.
    pub fn insert(&mut self, slot: PoolSlot, model: Box<dyn ModelAdapter>) -> usize {
        match self.index.get(&slot) {
            Some(&idx) => {
                self.models[idx] = model;
                idx
            }
            None => {
                let idx = self.models.len();
                self.models.push(model);
                self.index.insert(slot, idx);
                idx
            }
        }
    }

    pub fn get(&self, slot: &PoolSlot) -> Option<&dyn ModelAdapter> {
        self.index
            .get(slot)
            .and_then(|&idx| self.models.get(idx))
            .map(|model| model.as_ref())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Debug for ModelPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelPool")
            .field("models", &self.models.len())
            .field("slots", &self.index.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelError;

    struct Constant(u8, &'static str);

    impl ModelAdapter for Constant {
        fn fit(&mut self, _x: &[Vec<f64>], _y: &[u8]) -> Result<(), ModelError> {
            Ok(())
        }

        fn predict(&self, _row: &[f64]) -> Result<u8, ModelError> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            self.1
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut pool = ModelPool::new();
        assert!(pool.get(&PoolSlot::Global).is_none());

        pool.insert(PoolSlot::Global, Box::new(Constant(1, "a")));
        let model = pool.get(&PoolSlot::Global).unwrap();
        assert_eq!(model.predict(&[]).unwrap(), 1);
    }

    #[test]
    fn test_overwrite_in_place() {
        let mut pool = ModelPool::new();
        let first = pool.insert(PoolSlot::Global, Box::new(Constant(1, "a")));
        let second = pool.insert(PoolSlot::Global, Box::new(Constant(0, "b")));
        assert_eq!(first, second);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(&PoolSlot::Global).unwrap().name(), "b");
    }

    #[test]
    fn test_regime_slots_are_distinct() {
        let mut pool = ModelPool::new();
        let a = PoolSlot::Regime(RegimeKey::new(vec![Some(0), None]));
        let b = PoolSlot::Regime(RegimeKey::new(vec![Some(1), None]));
        pool.insert(a.clone(), Box::new(Constant(0, "a")));
        pool.insert(b.clone(), Box::new(Constant(1, "b")));

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(&a).unwrap().name(), "a");
        assert_eq!(pool.get(&b).unwrap().name(), "b");
        assert!(pool.get(&PoolSlot::Global).is_none());
        assert_eq!(a.to_string(), "regime[0|NA]");
    }
}
