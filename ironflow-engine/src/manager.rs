//! The activation registry: at most one running evaluator per `(strategy_id, symbol)`.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ironflow_bus::{EventBus, SlowConsumerPolicy, Subscriber};
use ironflow_core::{InstanceKey, OrderId, StrategyId, Symbol, Timestamp};
use ironflow_execution::{ExecutionClient, Order, OrderEvent, OrderSide, OrderType, PositionEvent};
use ironflow_indicator::{IndicatorValue, VariantCatalog};
use ironflow_strategy::{Direction, Strategy, StrategyFilter, StrategyStore};

use crate::error::ManagerError;
use crate::evaluator::Evaluator;
use crate::event::EngineEvent;
use crate::instance::StrategyInstance;

const INDICATOR_QUEUE_CAPACITY: usize = 256;
const ORDER_QUEUE_CAPACITY: usize = 64;
const POSITION_QUEUE_CAPACITY: usize = 64;

struct ActiveHandle {
    instance: Arc<tokio::sync::Mutex<StrategyInstance>>,
    indicator_sub: Subscriber<IndicatorValue>,
    order_sub: Subscriber<OrderEvent>,
    position_sub: Subscriber<PositionEvent>,
    task: tokio::task::JoinHandle<()>,
}

/// Owns the cache of known strategy definitions and the registry of currently-active
/// `(strategy_id, symbol)` evaluators. Activation is atomic-at-most-once: two concurrent
/// `activate` calls for the same key never both succeed in spawning an evaluator.
pub struct StrategyManager {
    strategies: DashMap<StrategyId, Arc<Strategy>>,
    active: DashMap<InstanceKey, ActiveHandle>,
    store: Arc<dyn StrategyStore>,
    catalog: Arc<VariantCatalog>,
    indicator_bus: Arc<EventBus<IndicatorValue>>,
    order_bus: Arc<EventBus<OrderEvent>>,
    position_bus: Arc<EventBus<PositionEvent>>,
    engine_bus: Arc<EventBus<EngineEvent>>,
    execution: Arc<dyn ExecutionClient>,
    session_budget_cap: f64,
}

impl std::fmt::Debug for StrategyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyManager")
            .field("strategies_cached", &self.strategies.len())
            .field("active_instances", &self.active.len())
            .finish()
    }
}

impl StrategyManager {
    pub fn new(
        store: Arc<dyn StrategyStore>,
        catalog: Arc<VariantCatalog>,
        indicator_bus: Arc<EventBus<IndicatorValue>>,
        order_bus: Arc<EventBus<OrderEvent>>,
        position_bus: Arc<EventBus<PositionEvent>>,
        engine_bus: Arc<EventBus<EngineEvent>>,
        execution: Arc<dyn ExecutionClient>,
        session_budget_cap: f64,
    ) -> Self {
        Self {
            strategies: DashMap::new(),
            active: DashMap::new(),
            store,
            catalog,
            indicator_bus,
            order_bus,
            position_bus,
            engine_bus,
            execution,
            session_budget_cap,
        }
    }

    /// Refreshes the strategies cache from the store. Must complete before any `activate`
    /// call during session startup, so a freshly-activated instance never evaluates against
    /// a stale or missing definition.
    pub async fn load_from_store(&self) {
        self.strategies.clear();
        for strategy in self.store.list(&StrategyFilter::default()).await {
            self.strategies.insert(strategy.strategy_id.clone(), Arc::new(strategy));
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, key: &InstanceKey) -> bool {
        self.active.contains_key(key)
    }

    /// Activates `(strategy_id, symbol)`: subscribes to the relevant indicator/order/
    /// position streams and spawns its evaluator. Fails if the strategy is unknown to the
    /// cache or already active for this symbol; never silently replaces a running instance.
    pub fn activate(&self, strategy_id: &StrategyId, symbol: &Symbol) -> Result<(), ManagerError> {
        let strategy = self
            .strategies
            .get(strategy_id)
            .map(|r| r.clone())
            .ok_or_else(|| ManagerError::UnknownStrategy(strategy_id.clone()))?;

        if let Err(source) = ironflow_strategy::validation::validate(&strategy, &self.catalog) {
            return Err(ManagerError::Validation { strategy_id: strategy_id.clone(), source });
        }

        let key = InstanceKey::new(strategy_id.clone(), symbol.clone());

        match self.active.entry(key.clone()) {
            Entry::Occupied(_) => Err(ManagerError::AlreadyActive(key)),
            Entry::Vacant(slot) => {
                let indicator_sub = self.indicator_bus.subscribe(
                    ironflow_bus::topic::INDICATOR_UPDATED,
                    ironflow_bus::topic::INDICATOR_UPDATED,
                    INDICATOR_QUEUE_CAPACITY,
                    SlowConsumerPolicy::DropOldest,
                );
                let order_sub = self.order_bus.subscribe(
                    "order.*",
                    ironflow_bus::topic::ORDER_FILLED,
                    ORDER_QUEUE_CAPACITY,
                    SlowConsumerPolicy::DropOldest,
                );
                let position_sub = self.position_bus.subscribe(
                    "position.*",
                    ironflow_bus::topic::POSITION_UPDATED,
                    POSITION_QUEUE_CAPACITY,
                    SlowConsumerPolicy::DropOldest,
                );

                let instance = Arc::new(tokio::sync::Mutex::new(StrategyInstance::new(
                    strategy_id.clone(),
                    symbol.clone(),
                    Timestamp::now(),
                )));

                let evaluator = Evaluator::new(
                    strategy,
                    instance.clone(),
                    indicator_sub.clone(),
                    order_sub.clone(),
                    position_sub.clone(),
                    self.execution.clone(),
                    self.engine_bus.clone(),
                    self.session_budget_cap,
                );
                let task = tokio::spawn(evaluator.run());

                slot.insert(ActiveHandle { instance, indicator_sub, order_sub, position_sub, task });
                tracing::info!(%key, "activated strategy instance");
                Ok(())
            }
        }
    }

    /// Idempotent: deactivating an already-inactive key is a no-op, not an error. Closes
    /// both subscriptions so the evaluator's `recv` loop drains whatever is queued and then
    /// exits on its own, then awaits its task to completion.
    ///
    /// Does not close an open position by default, matching the evaluator's own ZE1/E1
    /// ownership of position lifecycle — only the caller explicitly passing
    /// `close_positions=true` submits a market close here, ahead of the subscription
    /// teardown. The resulting fill is no longer observed by the (by-then-stopped)
    /// evaluator, so the position and order repositories are the source of truth for it.
    pub async fn deactivate(&self, key: &InstanceKey, close_positions: bool) {
        if close_positions {
            self.submit_close_for(key).await;
        }
        let Some((_, handle)) = self.active.remove(key) else { return };
        handle.indicator_sub.close();
        handle.order_sub.close();
        handle.position_sub.close();
        if let Err(error) = handle.task.await {
            tracing::warn!(%key, %error, "evaluator task ended abnormally during deactivation");
        }
        tracing::info!(%key, "deactivated strategy instance");
    }

    async fn submit_close_for(&self, key: &InstanceKey) {
        let Some(handle) = self.active.get(key) else { return };
        let (open_qty, open_position_id) = {
            let instance = handle.instance.lock().await;
            (instance.open_qty, instance.open_position_id.clone())
        };
        drop(handle);
        let Some(qty) = open_qty.filter(|q| *q > 0.0) else { return };
        if open_position_id.is_none() {
            return;
        }
        let Some(strategy) = self.strategies.get(&key.strategy_id).map(|r| r.clone()) else { return };
        let side = match strategy.direction {
            Direction::Long => OrderSide::Sell,
            Direction::Short => OrderSide::Cover,
        };
        let ts = Timestamp::now();
        let order_id = OrderId::new(format!("{}-{}-close-deactivate-{}", key.strategy_id, key.symbol, ts.as_nanos()));
        let order = Order::new(
            order_id,
            None,
            key.strategy_id.clone(),
            key.symbol.clone(),
            side,
            OrderType::Market,
            qty,
            None,
            strategy.z1_entry.leverage,
            ts,
        );
        if let Err(error) = self.execution.submit(order).await {
            tracing::warn!(%key, %error, "failed to submit close-on-deactivate order");
        }
    }

    pub async fn instance_state(&self, key: &InstanceKey) -> Option<crate::instance::State> {
        let handle = self.active.get(key)?;
        let instance = handle.instance.lock().await;
        Some(instance.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironflow_execution::PaperExecutionClient;
    use ironflow_strategy::condition::{ComparisonTarget, Condition, Operator};
    use ironflow_strategy::{
        Direction as StratDirection, EmergencyExit, GlobalLimits, O1Cancel, PositionSize, S1Signal, Strategy, Ze1Close,
        Z1Entry,
    };

    fn condition(variant_id: &str) -> Condition {
        Condition {
            id: "c1".into(),
            variant_id: ironflow_core::VariantId::from(variant_id),
            operator: Operator::Gt,
            target: ComparisonTarget::Scalar(0.0),
            duration_ms: None,
            window_ms: None,
        }
    }

    fn manager_with(strategy: Strategy) -> StrategyManager {
        let catalog = Arc::new(VariantCatalog::new());
        let order_bus = Arc::new(EventBus::default());
        let position_bus = Arc::new(EventBus::default());
        let execution = Arc::new(PaperExecutionClient::new(Default::default(), order_bus.clone(), position_bus.clone()));
        let manager = StrategyManager::new(
            Arc::new(ironflow_strategy::store::InMemoryStrategyStore::new(catalog.clone())),
            catalog,
            Arc::new(EventBus::default()),
            order_bus,
            position_bus,
            Arc::new(EventBus::default()),
            execution,
            10_000.0,
        );
        manager.strategies.insert(strategy.strategy_id.clone(), Arc::new(strategy));
        manager
    }

    fn pump_strategy() -> Strategy {
        Strategy {
            strategy_id: StrategyId::from("pump"),
            strategy_name: "pump".into(),
            direction: StratDirection::Long,
            enabled: true,
            s1_signal: S1Signal { conditions: vec![condition("pump_magnitude_pct")] },
            o1_cancel: O1Cancel { timeout_seconds: 60, conditions: vec![], cooldown_minutes: 1 },
            z1_entry: Z1Entry {
                conditions: vec![condition("rsi_14")],
                position_size: PositionSize::Fixed { value: 10.0 },
                leverage: 3.0,
                stop_loss: None,
                take_profit: None,
            },
            ze1_close: Ze1Close { conditions: vec![condition("pnl_pct")] },
            emergency_exit: EmergencyExit { conditions: vec![condition("pnl_pct")], cooldown_minutes: 60 },
            global_limits: GlobalLimits {
                max_daily_trades: 10,
                daily_loss_limit_pct: 3.0,
                max_concurrent_positions: 1,
                cooldown_minutes: 5,
                max_leverage: 10.0,
            },
        }
    }

    #[tokio::test]
    async fn at_most_one_active_instance_per_key() {
        let manager = manager_with(pump_strategy());
        let strategy_id = StrategyId::from("pump");
        let symbol = Symbol::new("BTCUSDT");

        manager.activate(&strategy_id, &symbol).unwrap();
        assert_eq!(manager.active_count(), 1);

        let error = manager.activate(&strategy_id, &symbol).unwrap_err();
        assert!(matches!(error, ManagerError::AlreadyActive(_)));
        assert_eq!(manager.active_count(), 1, "a failed second activation must not replace the first");
    }

    #[tokio::test]
    async fn deactivate_is_idempotent() {
        let manager = manager_with(pump_strategy());
        let key = InstanceKey::new(StrategyId::from("pump"), Symbol::new("BTCUSDT"));

        manager.activate(&key.strategy_id, &key.symbol).unwrap();
        manager.deactivate(&key, false).await;
        assert_eq!(manager.active_count(), 0);

        // calling it again on an already-inactive key is a no-op, not an error or panic.
        manager.deactivate(&key, false).await;
        assert_eq!(manager.active_count(), 0);
    }
}
