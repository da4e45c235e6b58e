//! Pull-style access to the last N emitted values for a given `(variant, symbol)`, for
//! strategy evaluators that need to read a value without subscribing to the bus.

use crate::value::IndicatorValue;
use dashmap::DashMap;
use ironflow_core::{Symbol, VariantId};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct CacheKey {
    variant_id: VariantId,
    symbol: Symbol,
}

/// Bounded in-memory tail of the most recent values per `(variant, symbol)`. Backed by the
/// generic [`ironflow_core::repository::Repository`] abstraction for anything that needs
/// to survive a restart; this cache only ever serves the hot path.
pub struct TailCache {
    capacity: usize,
    tails: DashMap<CacheKey, Mutex<VecDeque<IndicatorValue>>>,
}

impl std::fmt::Debug for TailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailCache")
            .field("capacity", &self.capacity)
            .field("tracked_keys", &self.tails.len())
            .finish()
    }
}

impl TailCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tails: DashMap::new(),
        }
    }

    pub fn record(&self, value: IndicatorValue) {
        let key = CacheKey {
            variant_id: value.variant_id.clone(),
            symbol: value.symbol.clone(),
        };
        let tail = self.tails.entry(key).or_insert_with(|| Mutex::new(VecDeque::with_capacity(self.capacity)));
        let mut tail = tail.lock().expect("tail cache entry poisoned");
        if tail.len() == self.capacity {
            tail.pop_front();
        }
        tail.push_back(value);
    }

    /// Returns up to `n` most recent values, oldest first. Empty if nothing has been
    /// recorded yet for this `(variant, symbol)` pair — e.g. before warmup completes.
    pub fn tail(&self, variant_id: &VariantId, symbol: &Symbol, n: usize) -> Vec<IndicatorValue> {
        let key = CacheKey {
            variant_id: variant_id.clone(),
            symbol: symbol.clone(),
        };
        match self.tails.get(&key) {
            Some(tail) => {
                let tail = tail.lock().expect("tail cache entry poisoned");
                tail.iter().rev().take(n).rev().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    pub fn latest(&self, variant_id: &VariantId, symbol: &Symbol) -> Option<IndicatorValue> {
        self.tail(variant_id, symbol, 1).into_iter().next()
    }
}
