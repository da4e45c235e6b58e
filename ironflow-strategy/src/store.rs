//! Durable strategy repository keyed by `strategy_id`, schema-validated on every write.

use crate::error::StoreError;
use crate::strategy::Strategy;
use crate::validation;
use async_trait::async_trait;
use indexmap::IndexMap;
use ironflow_core::StrategyId;
use ironflow_indicator::VariantCatalog;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct StrategyFilter {
    pub enabled_only: bool,
    pub strategy_name_contains: Option<String>,
}

impl StrategyFilter {
    fn matches(&self, strategy: &Strategy) -> bool {
        if self.enabled_only && !strategy.enabled {
            return false;
        }
        match &self.strategy_name_contains {
            Some(needle) => strategy.strategy_name.contains(needle.as_str()),
            None => true,
        }
    }
}

/// Durable CRUD surface for strategy definitions. A real implementation would be
/// QuestDB/Postgres-backed and is out of scope here; [`InMemoryStrategyStore`] is the
/// reference implementation used by the rest of the workspace and by tests.
#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn create(&self, strategy: Strategy) -> Result<(), StoreError>;
    async fn update(&self, strategy: Strategy) -> Result<(), StoreError>;
    async fn read(&self, id: &StrategyId) -> Result<Strategy, StoreError>;
    async fn list(&self, filter: &StrategyFilter) -> Vec<Strategy>;
    async fn delete(&self, id: &StrategyId) -> Result<(), StoreError>;
    async fn get_enabled(&self) -> Vec<Strategy>;
}

/// Reference implementation: a single `RwLock`-guarded ordered map. All writes go through
/// the same write-lock acquisition, which trivially gives single-writer serialization per
/// id (a stronger guarantee than required, since it also serializes writes across
/// different ids — acceptable for a reference store whose whole point is correctness, not
/// write throughput).
pub struct InMemoryStrategyStore {
    strategies: RwLock<IndexMap<StrategyId, Strategy>>,
    catalog: std::sync::Arc<VariantCatalog>,
}

impl std::fmt::Debug for InMemoryStrategyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStrategyStore").finish_non_exhaustive()
    }
}

impl InMemoryStrategyStore {
    pub fn new(catalog: std::sync::Arc<VariantCatalog>) -> Self {
        Self {
            strategies: RwLock::new(IndexMap::new()),
            catalog,
        }
    }
}

#[async_trait]
impl StrategyStore for InMemoryStrategyStore {
    async fn create(&self, strategy: Strategy) -> Result<(), StoreError> {
        validation::validate(&strategy, &self.catalog)?;
        let mut guard = self.strategies.write().await;
        if guard.contains_key(&strategy.strategy_id) {
            return Err(StoreError::AlreadyExists(strategy.strategy_id));
        }
        guard.insert(strategy.strategy_id.clone(), strategy);
        Ok(())
    }

    async fn update(&self, strategy: Strategy) -> Result<(), StoreError> {
        validation::validate(&strategy, &self.catalog)?;
        let mut guard = self.strategies.write().await;
        if !guard.contains_key(&strategy.strategy_id) {
            return Err(StoreError::NotFound(strategy.strategy_id));
        }
        guard.insert(strategy.strategy_id.clone(), strategy);
        Ok(())
    }

    async fn read(&self, id: &StrategyId) -> Result<Strategy, StoreError> {
        self.strategies
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list(&self, filter: &StrategyFilter) -> Vec<Strategy> {
        self.strategies
            .read()
            .await
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect()
    }

    async fn delete(&self, id: &StrategyId) -> Result<(), StoreError> {
        let mut guard = self.strategies.write().await;
        guard.shift_remove(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        Ok(())
    }

    async fn get_enabled(&self) -> Vec<Strategy> {
        self.list(&StrategyFilter {
            enabled_only: true,
            strategy_name_contains: None,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ComparisonTarget, Condition, Operator};
    use crate::strategy::{
        Direction, EmergencyExit, GlobalLimits, O1Cancel, PositionSize, S1Signal, Strategy, Ze1Close, Z1Entry,
    };
    use ironflow_core::VariantId;
    use std::sync::Arc;

    fn condition(variant_id: &str) -> Condition {
        Condition {
            id: "c1".into(),
            variant_id: VariantId::from(variant_id),
            operator: Operator::Gt,
            target: ComparisonTarget::Scalar(0.0),
            duration_ms: None,
            window_ms: None,
        }
    }

    fn strategy(id: &str, enabled: bool) -> Strategy {
        Strategy {
            strategy_id: StrategyId::from(id),
            strategy_name: id.to_string(),
            direction: Direction::Long,
            enabled,
            s1_signal: S1Signal {
                conditions: vec![condition("rsi_14")],
            },
            o1_cancel: O1Cancel {
                timeout_seconds: 60,
                conditions: vec![],
                cooldown_minutes: 1,
            },
            z1_entry: Z1Entry {
                conditions: vec![condition("rsi_14")],
                position_size: PositionSize::Fixed { value: 100.0 },
                leverage: 2.0,
                stop_loss: None,
                take_profit: None,
            },
            ze1_close: Ze1Close {
                conditions: vec![condition("rsi_14")],
            },
            emergency_exit: EmergencyExit {
                conditions: vec![],
                cooldown_minutes: 60,
            },
            global_limits: GlobalLimits {
                max_daily_trades: 10,
                daily_loss_limit_pct: 3.0,
                max_concurrent_positions: 1,
                cooldown_minutes: 5,
                max_leverage: 10.0,
            },
        }
    }

    fn catalog() -> Arc<VariantCatalog> {
        let mut catalog = VariantCatalog::new();
        let variant = ironflow_indicator::IndicatorVariant::new(
            "rsi_14",
            "RSI",
            ironflow_indicator::catalog::params(&[("window_ms", 60_000.0)]),
        );
        catalog
            .register(variant, ironflow_indicator::catalog::OutputShape::Scalar, ironflow_indicator::builtin::rsi_factory)
            .unwrap();
        Arc::new(catalog)
    }

    #[tokio::test]
    async fn create_read_delete_read_round_trip() {
        let store = InMemoryStrategyStore::new(catalog());
        let strategy = strategy("s1", true);
        store.create(strategy.clone()).await.unwrap();

        let read_back = store.read(&StrategyId::from("s1")).await.unwrap();
        assert_eq!(read_back, strategy);

        store.delete(&StrategyId::from("s1")).await.unwrap();
        assert!(matches!(
            store.read(&StrategyId::from("s1")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryStrategyStore::new(catalog());
        store.create(strategy("s1", true)).await.unwrap();
        let error = store.create(strategy("s1", true)).await.unwrap_err();
        assert!(matches!(error, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_enabled_filters_disabled_strategies() {
        let store = InMemoryStrategyStore::new(catalog());
        store.create(strategy("enabled_one", true)).await.unwrap();
        store.create(strategy("disabled_one", false)).await.unwrap();

        let enabled = store.get_enabled().await;
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].strategy_id, StrategyId::from("enabled_one"));
    }
}
