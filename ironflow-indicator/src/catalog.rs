//! Variant catalog: `variant_id -> (factory, output_shape)`, replacing dynamic dispatch
//! over a class hierarchy with explicit registration.

use crate::variant::{IndicatorVariant, VariantParams};
use indexmap::IndexMap;
use ironflow_core::{Timestamp, VariantId};
use std::collections::HashMap;
use thiserror::Error;

/// Describes the shape of a variant's emitted value, so consumers (e.g. the strategy
/// evaluator validating a `Condition`'s operator against the variant's value type) can
/// reject incompatible combinations without running the computation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OutputShape {
    Scalar,
    Composite,
}

/// A single incremental indicator computation. Implementations own their own internal
/// window/accumulator state; the engine calls `on_sample` once per accepted tick.
pub trait Indicator: Send + std::fmt::Debug {
    fn on_sample(&mut self, ts: Timestamp, price: f64) -> Option<crate::value::IndicatorOutput>;
}

pub type IndicatorFactory = fn(&VariantParams) -> Box<dyn Indicator>;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum CatalogError {
    #[error("variant {0} is already registered; registration must be unique, never a silent overwrite")]
    DuplicateVariant(String),
    #[error("variant {0} is not registered")]
    UnknownVariant(String),
}

struct Registration {
    base_type: String,
    output_shape: OutputShape,
    factory: IndicatorFactory,
}

/// Registry of known indicator variants, auto-discovered by identity (`variant_id`) rather
/// than by base type name, so two differently-parameterized instances of the same base
/// type (`EMA_20` vs `EMA_50`) are tracked independently.
#[derive(Default)]
pub struct VariantCatalog {
    variants: HashMap<VariantId, IndicatorVariant>,
    registrations: HashMap<VariantId, Registration>,
}

impl std::fmt::Debug for VariantCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantCatalog")
            .field("variant_count", &self.variants.len())
            .finish()
    }
}

impl VariantCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `variant` with the given `factory`. Returns an error if `variant_id` is
    /// already registered — never overwrites.
    pub fn register(
        &mut self,
        variant: IndicatorVariant,
        output_shape: OutputShape,
        factory: IndicatorFactory,
    ) -> Result<(), CatalogError> {
        if self.registrations.contains_key(&variant.variant_id) {
            return Err(CatalogError::DuplicateVariant(variant.variant_id.as_str().to_string()));
        }
        self.registrations.insert(
            variant.variant_id.clone(),
            Registration {
                base_type: variant.base_type.clone(),
                output_shape,
                factory,
            },
        );
        self.variants.insert(variant.variant_id.clone(), variant);
        Ok(())
    }

    pub fn contains(&self, variant_id: &VariantId) -> bool {
        self.variants.contains_key(variant_id)
    }

    pub fn get(&self, variant_id: &VariantId) -> Option<&IndicatorVariant> {
        self.variants.get(variant_id)
    }

    pub fn output_shape(&self, variant_id: &VariantId) -> Option<OutputShape> {
        self.registrations.get(variant_id).map(|r| r.output_shape)
    }

    pub fn base_type(&self, variant_id: &VariantId) -> Option<&str> {
        self.registrations.get(variant_id).map(|r| r.base_type.as_str())
    }

    pub fn instantiate(&self, variant_id: &VariantId) -> Result<Box<dyn Indicator>, CatalogError> {
        let registration = self
            .registrations
            .get(variant_id)
            .ok_or_else(|| CatalogError::UnknownVariant(variant_id.as_str().to_string()))?;
        let variant = self
            .variants
            .get(variant_id)
            .ok_or_else(|| CatalogError::UnknownVariant(variant_id.as_str().to_string()))?;
        Ok((registration.factory)(&variant.params))
    }

    pub fn variant_ids(&self) -> impl Iterator<Item = &VariantId> {
        self.variants.keys()
    }

    pub fn all(&self) -> impl Iterator<Item = &IndicatorVariant> {
        self.variants.values()
    }
}

/// Convenience builder mirroring common variant catalogs used across tests/demos.
pub fn params(pairs: &[(&str, f64)]) -> VariantParams {
    let mut map = IndexMap::new();
    for (key, value) in pairs {
        map.insert((*key).to_string(), *value);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut catalog = VariantCatalog::new();
        let variant = IndicatorVariant::new("sma_20", "SMA", params(&[("period", 20.0), ("window_ms", 20_000.0)]));
        catalog
            .register(variant.clone(), OutputShape::Scalar, builtin::sma_factory)
            .unwrap();
        let err = catalog
            .register(variant, OutputShape::Scalar, builtin::sma_factory)
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateVariant(_)));
    }
}
