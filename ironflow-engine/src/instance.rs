//! Runtime state attached to one active `(strategy_id, symbol)` binding.

use ironflow_core::{InstanceKey, SignalId, StrategyId, Symbol, Timestamp, VariantId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `MONITORING -> SIGNAL_DETECTED -> ENTRY_EVALUATION -> POSITION_ACTIVE -> {EXITED,
/// EMERGENCY_EXIT} -> COOLDOWN -> MONITORING`, with `SIGNAL_DETECTED -> SIGNAL_CANCELLED ->
/// COOLDOWN` as the O1 branch.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum State {
    Monitoring,
    SignalDetected,
    EntryEvaluation,
    PositionActive,
    Exited,
    EmergencyExit,
    SignalCancelled,
    Cooldown,
}

/// `{signal_id, strategy_id, symbol, ts, triggering_values}`, emitted on an S1-true
/// transition and referenced by the downstream O1/Z1 evaluation of the same instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_id: SignalId,
    pub strategy_id: StrategyId,
    pub symbol: Symbol,
    pub ts: Timestamp,
    pub triggering_values: IndexMap<VariantId, f64>,
}

/// Created by the manager on activation; one per `(strategy_id, symbol)` instance key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyInstance {
    pub strategy_id: StrategyId,
    pub symbol: Symbol,
    pub state: State,
    pub state_entered_at: Timestamp,
    pub cooldown_until: Option<Timestamp>,
    pub consecutive_losses: u32,
    pub daily_trades_count: u32,
    pub daily_pnl_pct: f64,
    pub active_signal: Option<Signal>,
    pub pending_order_id: Option<ironflow_core::OrderId>,
    /// Filled quantity of the current open position, kept so a later close order can
    /// request the same size back.
    pub open_qty: Option<f64>,
    /// Set once a close order is submitted; distinguishes a ZE1 exit from an E1 emergency
    /// exit when the fill lands, since both share the same pending order id.
    pub pending_close_is_emergency: bool,
    pub open_position_id: Option<ironflow_core::PositionId>,
}

impl StrategyInstance {
    pub fn new(strategy_id: StrategyId, symbol: Symbol, now: Timestamp) -> Self {
        Self {
            strategy_id,
            symbol,
            state: State::Monitoring,
            state_entered_at: now,
            cooldown_until: None,
            consecutive_losses: 0,
            daily_trades_count: 0,
            daily_pnl_pct: 0.0,
            active_signal: None,
            pending_order_id: None,
            open_qty: None,
            pending_close_is_emergency: false,
            open_position_id: None,
        }
    }

    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(self.strategy_id.clone(), self.symbol.clone())
    }

    pub fn transition_to(&mut self, state: State, now: Timestamp) {
        self.state = state;
        self.state_entered_at = now;
    }

    /// Whether `MONITORING` re-entry is currently gated by an unexpired cooldown.
    pub fn is_in_cooldown(&self, now: Timestamp) -> bool {
        matches!(self.cooldown_until, Some(until) if now < until)
    }
}
