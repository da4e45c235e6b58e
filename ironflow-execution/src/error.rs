use ironflow_core::OrderId;
use thiserror::Error;

use crate::order::OrderStatus;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("order {order_id} rejected: {reason}")]
    Rejected { order_id: OrderId, reason: String },
    #[error("order {order_id} cannot transition {from:?} -> {to:?}")]
    InvalidTransition { order_id: OrderId, from: OrderStatus, to: OrderStatus },
    #[error("unknown order {0}")]
    UnknownOrder(OrderId),
    #[error("unknown position {0}")]
    UnknownPosition(ironflow_core::PositionId),
}
