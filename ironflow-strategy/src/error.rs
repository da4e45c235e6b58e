//! Schema validation and store error taxonomy.

use ironflow_core::StrategyId;
use thiserror::Error;

/// A single schema rule violation, tagged by the section it was found in ("" for
/// strategy-wide rules like acyclicity). Strategy Store validation collects every
/// violation before returning, rather than failing on the first one.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("[{section}] {message}")]
pub struct SectionError {
    pub section: &'static str,
    pub message: String,
}

impl SectionError {
    pub fn new(section: &'static str, message: impl Into<String>) -> Self {
        Self {
            section,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("strategy failed schema validation: {0:?}")]
pub struct StrategyValidationError(pub Vec<SectionError>);

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StoreError {
    #[error("strategy {0} not found")]
    NotFound(StrategyId),

    #[error("strategy {0} already exists")]
    AlreadyExists(StrategyId),

    #[error(transparent)]
    Validation(#[from] StrategyValidationError),
}
