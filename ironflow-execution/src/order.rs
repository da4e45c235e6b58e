//! Order entity and its monotone status lifecycle.

use ironflow_core::{OrderId, SignalId, StrategyId, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
    Short,
    Cover,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// `NEW -> PARTIALLY_FILLED -> {FILLED, CANCELLED, REJECTED, FAILED, EXPIRED}`. The last five
/// are terminal; once reached, no further transition is permitted.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Failed,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::New | Self::PartiallyFilled)
    }

    /// Whether `self -> next` respects the monotone lifecycle. A terminal status never
    /// transitions further; `New` may only advance to `PartiallyFilled` or a terminal status.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self {
            Self::New => next != Self::New,
            Self::PartiallyFilled => next != Self::New,
            _ => unreachable!("terminal statuses handled above"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub signal_id: Option<SignalId>,
    pub strategy_id: StrategyId,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: f64,
    pub limit_price: Option<f64>,
    pub leverage: f64,
    pub ts_created: Timestamp,
    pub ts_terminal: Option<Timestamp>,
    pub status: OrderStatus,
    pub filled_qty: f64,
    pub filled_price: f64,
    pub commission: f64,
    pub slippage: f64,
}

impl Order {
    pub fn new(
        order_id: OrderId,
        signal_id: Option<SignalId>,
        strategy_id: StrategyId,
        symbol: Symbol,
        side: OrderSide,
        order_type: OrderType,
        qty: f64,
        limit_price: Option<f64>,
        leverage: f64,
        ts_created: Timestamp,
    ) -> Self {
        Self {
            order_id,
            signal_id,
            strategy_id,
            symbol,
            side,
            order_type,
            qty,
            limit_price,
            leverage,
            ts_created,
            ts_terminal: None,
            status: OrderStatus::New,
            filled_qty: 0.0,
            filled_price: 0.0,
            commission: 0.0,
            slippage: 0.0,
        }
    }

    /// Applies a new status, rejecting any transition that would violate monotonicity.
    pub fn apply_status(&mut self, next: OrderStatus, ts: Timestamp) -> Result<(), crate::error::ExecutionError> {
        if !self.status.can_transition_to(next) {
            return Err(crate::error::ExecutionError::InvalidTransition { order_id: self.order_id.clone(), from: self.status, to: next });
        }
        self.status = next;
        if next.is_terminal() {
            self.ts_terminal = Some(ts);
        }
        Ok(())
    }

    /// Whether this order opens a new position (vs. closing an existing one).
    pub fn is_opening(&self) -> bool {
        matches!(self.side, OrderSide::Buy | OrderSide::Short)
    }
}

/// Bus payload for order lifecycle notifications. The bus topic for these is keyed by
/// `order_id` so that events for the same order are strictly FIFO regardless of how many
/// other orders are in flight concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderEvent {
    Created { order_id: OrderId },
    PartiallyFilled { order_id: OrderId, filled_qty: f64, filled_price: f64 },
    Filled { order_id: OrderId, filled_qty: f64, filled_price: f64, commission: f64, slippage: f64 },
    Cancelled { order_id: OrderId },
    Rejected { order_id: OrderId, reason: String },
    Failed { order_id: OrderId, reason: String },
    Expired { order_id: OrderId },
}

impl OrderEvent {
    pub fn order_id(&self) -> &OrderId {
        match self {
            Self::Created { order_id }
            | Self::PartiallyFilled { order_id, .. }
            | Self::Filled { order_id, .. }
            | Self::Cancelled { order_id }
            | Self::Rejected { order_id, .. }
            | Self::Failed { order_id, .. }
            | Self::Expired { order_id } => order_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_never_reverts_from_a_terminal_state() {
        assert!(!OrderStatus::Filled.can_transition_to(OrderStatus::PartiallyFilled));
        assert!(!OrderStatus::Rejected.can_transition_to(OrderStatus::New));
    }

    #[test]
    fn new_can_advance_to_partial_or_any_terminal_status() {
        assert!(OrderStatus::New.can_transition_to(OrderStatus::PartiallyFilled));
        assert!(OrderStatus::New.can_transition_to(OrderStatus::Filled));
        assert!(OrderStatus::PartiallyFilled.can_transition_to(OrderStatus::Filled));
    }
}
