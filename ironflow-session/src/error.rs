use ironflow_core::SessionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("session_conflict: {requested_mode:?} session would overlap {existing_session} ({existing_mode:?}) on symbol {symbol}")]
    Conflict {
        symbol: ironflow_core::Symbol,
        requested_mode: crate::session::SessionMode,
        existing_session: SessionId,
        existing_mode: crate::session::SessionMode,
    },

    #[error("config missing or invalid: {0}")]
    Config(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("{0} strategy activation(s) failed during startup, session marked degraded")]
    DegradedStartup(usize),

    #[error("internal fatal error: {0}")]
    Fatal(String),
}

impl SessionError {
    /// CLI exit code per the process exit-code table: 0 success, 2 validation error, 3
    /// config missing, 4 dependency unavailable, 5 session conflict, 10 internal fatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 2,
            Self::Conflict { .. } => 5,
            Self::Config(_) => 3,
            Self::DependencyUnavailable(_) => 4,
            Self::DegradedStartup(_) => 0,
            Self::Fatal(_) => 10,
        }
    }
}
