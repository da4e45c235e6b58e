use thiserror::Error;

/// CLI-local error taxonomy. Exit codes follow the process contract: 0 success, 2
/// validation error, 3 config missing/invalid, 4 dependency unavailable, 5 session
/// conflict, 10 internal fatal.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Session(#[from] ironflow_session::SessionError),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 3,
            Self::Session(source) => source.exit_code(),
        }
    }
}
