//! The [`IndicatorVariant`]: the canonical identity of an indicator computation.

use indexmap::IndexMap;
use ironflow_core::VariantId;
use serde::{Deserialize, Serialize};

/// Ordered mapping of parameter name to scalar value. Ordered so two variants built from
/// the same base type with the same params (just listed differently) still compare equal
/// in the places that matter (hashing on `variant_id`, not on this map).
pub type VariantParams = IndexMap<String, f64>;

/// The same base type with different params is a different variant: `EMA` with
/// `period=20` and `EMA` with `period=50` are two distinct, independently warmed-up,
/// independently cached variants, both referenced by their own stable `variant_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorVariant {
    pub variant_id: VariantId,
    pub base_type: String,
    pub params: VariantParams,
}

impl IndicatorVariant {
    pub fn new(variant_id: impl Into<VariantId>, base_type: impl Into<String>, params: VariantParams) -> Self {
        Self {
            variant_id: variant_id.into(),
            base_type: base_type.into(),
            params,
        }
    }

    pub fn param(&self, name: &str) -> Option<f64> {
        self.params.get(name).copied()
    }

    pub fn param_or(&self, name: &str, default: f64) -> f64 {
        self.param(name).unwrap_or(default)
    }

    /// The lookback window, in milliseconds, this variant needs warmed before it emits.
    pub fn window_ms(&self) -> u64 {
        self.param_or("window_ms", 60_000.0).max(0.0) as u64
    }

    /// Nominal interval between expected samples, used to estimate how many samples a
    /// fully warmed window should contain.
    pub fn bar_interval_ms(&self) -> u64 {
        self.param_or("bar_interval_ms", 1_000.0).max(1.0) as u64
    }

    pub fn expected_sample_count(&self) -> u64 {
        (self.window_ms() / self.bar_interval_ms()).max(1)
    }
}
