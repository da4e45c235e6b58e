//! Bus payloads the session controller publishes on `session.*` topics.

use ironflow_core::SessionId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    Started { session_id: SessionId },
    Stopped { session_id: SessionId },
    Degraded { session_id: SessionId, failed_activations: usize },
}
