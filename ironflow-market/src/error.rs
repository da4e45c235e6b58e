use ironflow_core::Symbol;
use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum MarketDataError {
    #[error("stale tick for {symbol}: ts older than last-seen by more than tolerance")]
    StaleTick { symbol: Symbol },
    #[error("duplicate ts for {symbol}, dropped")]
    DuplicateTimestamp { symbol: Symbol },
    #[error("venue connection failed: {0}")]
    ConnectionFailed(String),
}
