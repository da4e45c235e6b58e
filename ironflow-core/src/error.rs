//! # Error Taxonomy
//!
//! Aggregates the subsystem error enums exposed by each Ironflow crate into one top-level
//! [`IronflowError`], the same way `ToucanError` aggregates `DataError` and
//! `ExecutionError` elsewhere. Each subsystem crate still owns its own error enum; this
//! crate only knows about a handful of error *kinds* (Validation, Conflict, Transient,
//! DataQuality, Precondition, Fatal) so call sites that only care about the kind don't need
//! to depend on every subsystem crate.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The error kinds used across this platform's error handling design. Distinct from the
/// concrete per-subsystem error enums: a `MarketDataError::StaleTick` and a
/// `ManagerError::UnknownStrategy` are both represented here, by different variants, but
/// share the `DataQuality` / `Validation` *kind* for routing/logging purposes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum ErrorKind {
    Validation,
    Conflict,
    Transient,
    DataQuality,
    Precondition,
    Fatal,
}

/// A taxonomy-tagged error event as it appears on the `system.*` bus topics.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ErrorEvent {
    pub ts: Timestamp,
    pub kind: ErrorKind,
    pub error_code: &'static str,
    pub message: String,
}

impl ErrorEvent {
    pub fn new(ts: Timestamp, kind: ErrorKind, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            ts,
            kind,
            error_code,
            message: message.into(),
        }
    }
}

/// Central error type aggregating the failure modes that can escape from any Ironflow
/// subsystem up to a caller that only links `ironflow-core`.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum IronflowError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient: {0}")]
    Transient(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("timestamp error: {0}")]
    Time(#[from] crate::time::TimeError),

    #[error("repository error: {0}")]
    Repository(#[from] crate::repository::RepositoryError),
}

impl IronflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Time(_) => ErrorKind::Validation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Transient(_) | Self::Repository(_) => ErrorKind::Transient,
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }
}
