//! Emitted indicator values.

use indexmap::IndexMap;
use ironflow_core::{Symbol, Timestamp, VariantId};
use serde::{Deserialize, Serialize};

/// A scalar for simple indicators, or a small named record for composites (e.g. Bollinger
/// Bands emit `{upper, mid, lower}` as a single event rather than three).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndicatorOutput {
    Scalar(f64),
    Composite(IndexMap<String, f64>),
}

impl IndicatorOutput {
    /// Returns the scalar value, or the composite's `mid`/`value` field if present.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            IndicatorOutput::Scalar(value) => Some(*value),
            IndicatorOutput::Composite(fields) => {
                fields.get("mid").or_else(|| fields.get("value")).copied()
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            IndicatorOutput::Scalar(value) => value.is_finite(),
            IndicatorOutput::Composite(fields) => fields.values().all(|v| v.is_finite()),
        }
    }
}

/// Emitted monotonically in `ts` per `(variant, symbol)`. Stale values (`ts` <= last
/// emitted `ts`) must never reach this type — the engine drops them before construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValue {
    pub variant_id: VariantId,
    pub symbol: Symbol,
    pub ts: Timestamp,
    pub value: IndicatorOutput,
    pub metadata: IndexMap<String, String>,
}
