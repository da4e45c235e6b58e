//! Error taxonomy for the indicator engine.

use ironflow_core::{Symbol, VariantId};
use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum IndicatorError {
    #[error("variant {0} is not registered in the catalog")]
    UnknownVariant(String),

    #[error("variant {variant_id} has no instance running for symbol {symbol}")]
    NoInstance { variant_id: VariantId, symbol: Symbol },

    #[error("catalog registration failed: {0}")]
    Catalog(#[from] crate::catalog::CatalogError),
}
