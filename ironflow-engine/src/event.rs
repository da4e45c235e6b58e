//! Bus payloads the evaluator publishes alongside order/position events.

use ironflow_core::{InstanceKey, OrderId, Symbol};
use serde::{Deserialize, Serialize};

use crate::instance::{Signal, State};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    SignalDetected(Signal),
    SignalCancelled { instance_key: InstanceKey },
    EntrySubmitted { instance_key: InstanceKey, order_id: OrderId },
    EntryConditionsFailed { instance_key: InstanceKey, reason_code: String },
    EmergencyExit { instance_key: InstanceKey, symbol: Symbol },
    StateMachineTransition { instance_key: InstanceKey, from: State, to: State },
}
