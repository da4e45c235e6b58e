//! The `Session` entity: a named, symbol-scoped, budget-capped run of one or more
//! strategies, and the lifecycle it moves through from the controller's point of view.

use ironflow_core::{SessionId, StrategyId, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// Live > paper > backtest, in that order, for session-conflict priority comparisons.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Backtest,
    Paper,
    Live,
}

impl SessionMode {
    /// Higher value wins a symbol-overlap conflict. `Live` always outranks `Paper`, which
    /// always outranks `Backtest`.
    pub fn priority(self) -> u8 {
        match self {
            Self::Backtest => 0,
            Self::Paper => 1,
            Self::Live => 2,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum SessionStatus {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// What the caller asks the controller to start: the symbol/strategy scope and the budget
/// ceiling every `Percentage` position size in those strategies is sized against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub mode: SessionMode,
    pub symbols: Vec<Symbol>,
    pub strategies: Vec<StrategyId>,
    pub budget_cap: f64,
    /// If a conflicting session already claims an overlapping symbol at equal-or-higher
    /// priority, return its id instead of refusing with `session_conflict`.
    pub idempotent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub mode: SessionMode,
    pub symbols: Vec<Symbol>,
    pub strategies: Vec<StrategyId>,
    pub budget_cap: f64,
    pub started_at: Timestamp,
    pub status: SessionStatus,
    /// Set once the controller observes more activation failures than its configured
    /// tolerance during startup, or once a running evaluator count drops too far from what
    /// was activated. A degraded session stays `Running`; it is a health signal, not a
    /// lifecycle state.
    pub degraded: bool,
}

impl Session {
    pub fn new(session_id: SessionId, request: &SessionRequest, now: Timestamp) -> Self {
        Self {
            session_id,
            mode: request.mode,
            symbols: request.symbols.clone(),
            strategies: request.strategies.clone(),
            budget_cap: request.budget_cap,
            started_at: now,
            status: SessionStatus::Created,
            degraded: false,
        }
    }

    pub fn overlaps_symbols(&self, symbols: &[Symbol]) -> bool {
        self.symbols.iter().any(|s| symbols.contains(s))
    }
}
