//! The [`Strategy`] definition: five fixed sections (S1/O1/Z1/ZE1/E1) plus global limits.

use crate::condition::Condition;
use ironflow_core::StrategyId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

/// Signal detection: fires only when every condition is true (AND).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S1Signal {
    pub conditions: Vec<Condition>,
}

/// Signal cancellation: a timeout, OR'd conditions, and a cooldown applied if cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct O1Cancel {
    pub timeout_seconds: u64,
    pub conditions: Vec<Condition>,
    pub cooldown_minutes: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PositionSize {
    Fixed { value: f64 },
    /// Percentage of the session's configured budget cap — not equity, not remaining
    /// budget, since the budget cap is the only denominator both the evaluator and the
    /// order manager can read without it drifting intra-trade.
    Percentage { value: f64 },
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLoss {
    pub enabled: bool,
    pub offset_percent: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfit {
    pub enabled: bool,
    pub offset_percent: f64,
}

/// Entry: AND'd conditions, sizing, leverage, optional SL/TP offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Z1Entry {
    pub conditions: Vec<Condition>,
    pub position_size: PositionSize,
    pub leverage: f64,
    pub stop_loss: Option<StopLoss>,
    pub take_profit: Option<TakeProfit>,
}

/// Normal close: OR'd conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ze1Close {
    pub conditions: Vec<Condition>,
}

/// Emergency exit: OR'd conditions, with its own (typically long) cooldown. Evaluated ahead
/// of the rest of the section dispatch once a signal has been detected, whether or not a
/// position is open yet — see `ironflow-engine::evaluator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyExit {
    pub conditions: Vec<Condition>,
    pub cooldown_minutes: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalLimits {
    pub max_daily_trades: u32,
    pub daily_loss_limit_pct: f64,
    pub max_concurrent_positions: u32,
    pub cooldown_minutes: u64,
    pub max_leverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub strategy_id: StrategyId,
    pub strategy_name: String,
    pub direction: Direction,
    pub enabled: bool,
    pub s1_signal: S1Signal,
    pub o1_cancel: O1Cancel,
    pub z1_entry: Z1Entry,
    pub ze1_close: Ze1Close,
    pub emergency_exit: EmergencyExit,
    pub global_limits: GlobalLimits,
}

impl Strategy {
    /// Every `variant_id` this strategy's conditions reference, across all sections.
    pub fn referenced_variant_ids(&self) -> impl Iterator<Item = &ironflow_core::VariantId> {
        self.s1_signal
            .conditions
            .iter()
            .chain(self.o1_cancel.conditions.iter())
            .chain(self.z1_entry.conditions.iter())
            .chain(self.ze1_close.conditions.iter())
            .chain(self.emergency_exit.conditions.iter())
            .map(|c| &c.variant_id)
    }
}
