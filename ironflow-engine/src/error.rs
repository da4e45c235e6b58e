use ironflow_core::{InstanceKey, StrategyId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("strategy {0} is not present in the manager's cache")]
    UnknownStrategy(StrategyId),
    #[error("instance {0} is already active")]
    AlreadyActive(InstanceKey),
    #[error("strategy {strategy_id} failed validation: {source}")]
    Validation { strategy_id: StrategyId, #[source] source: ironflow_strategy::StrategyValidationError },
}
