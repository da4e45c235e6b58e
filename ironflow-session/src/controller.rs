//! The session controller: owns the two-phase startup ordering (warm the strategy cache,
//! then activate every requested instance, only then report success), session-conflict
//! refusal/idempotency, and the degraded-status signal surfaced when too many instances
//! fail to activate.

use std::sync::Arc;

use indexmap::IndexMap;
use ironflow_bus::{topic, EventBus};
use ironflow_core::{InstanceKey, SessionId, Timestamp};
use ironflow_engine::StrategyManager;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::SessionError;
use crate::event::SessionEvent;
use crate::session::{Session, SessionRequest, SessionStatus};

/// A session is considered to still be claiming its symbols while in any of these
/// statuses; `Stopped`/`Failed` sessions no longer participate in conflict checks.
fn claims_symbols(status: SessionStatus) -> bool {
    matches!(status, SessionStatus::Created | SessionStatus::Starting | SessionStatus::Running | SessionStatus::Stopping)
}

pub struct SessionController {
    sessions: RwLock<IndexMap<SessionId, Session>>,
    manager: Arc<StrategyManager>,
    session_bus: Arc<EventBus<SessionEvent>>,
    config: Config,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController").finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(manager: Arc<StrategyManager>, session_bus: Arc<EventBus<SessionEvent>>, config: Config) -> Self {
        Self {
            sessions: RwLock::new(IndexMap::new()),
            manager,
            session_bus,
            config,
        }
    }

    pub async fn status(&self, session_id: &SessionId) -> Result<Session, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))
    }

    pub async fn list(&self) -> Vec<Session> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Finds an existing claimant of any symbol in `symbols` whose mode priority is
    /// equal-or-higher than `requested`. Returns the first one found; session requests are
    /// expected to target a small, deliberately scoped symbol set, so "first" is stable
    /// enough for the refuse-or-return-idempotent decision.
    async fn find_conflict(&self, symbols: &[ironflow_core::Symbol], requested_priority: u8) -> Option<Session> {
        self.sessions
            .read()
            .await
            .values()
            .find(|s| claims_symbols(s.status) && s.overlaps_symbols(symbols) && s.mode.priority() >= requested_priority)
            .cloned()
    }

    /// Starts a new session. Per the startup ordering invariant: the strategy cache is
    /// fully warmed (`StrategyManager::load_from_store`) *before* a single `activate` call
    /// is attempted, so an activation can never race a cold cache and silently fail to find
    /// a strategy that does in fact exist in the store.
    pub async fn start(&self, request: SessionRequest) -> Result<SessionId, SessionError> {
        if let Some(existing) = self.find_conflict(&request.symbols, request.mode.priority()).await {
            if request.idempotent {
                return Ok(existing.session_id);
            }
            let symbol = existing
                .symbols
                .iter()
                .find(|s| request.symbols.contains(s))
                .cloned()
                .unwrap_or_else(|| request.symbols[0].clone());
            return Err(SessionError::Conflict {
                symbol,
                requested_mode: request.mode,
                existing_session: existing.session_id,
                existing_mode: existing.mode,
            });
        }

        let session_id = SessionId::new(uuid::Uuid::new_v4().to_string());
        let now = Timestamp::now();
        let session = Session::new(session_id.clone(), &request, now);
        self.sessions.write().await.insert(session_id.clone(), session);
        self.set_status(&session_id, SessionStatus::Starting).await;

        self.manager.load_from_store().await;

        let mut failures = 0usize;
        let mut attempted = 0usize;
        for strategy_id in &request.strategies {
            for symbol in &request.symbols {
                attempted += 1;
                let key = InstanceKey::new(strategy_id.clone(), symbol.clone());
                if let Err(error) = self.manager.activate(strategy_id, symbol) {
                    tracing::warn!(%key, %error, "strategy activation failed during session start");
                    failures += 1;
                }
            }
        }

        if attempted > 0 && failures == attempted {
            self.set_status(&session_id, SessionStatus::Failed).await;
            return Err(SessionError::Fatal(format!(
                "all {attempted} strategy activation(s) failed during session start"
            )));
        }

        self.set_status(&session_id, SessionStatus::Running).await;
        if failures >= self.config.session.degraded_failure_threshold && failures > 0 {
            self.set_degraded(&session_id, true).await;
            self.session_bus
                .publish(topic::SESSION_DEGRADED, "session_controller", SessionEvent::Degraded {
                    session_id: session_id.clone(),
                    failed_activations: failures,
                })
                .await;
        }
        self.session_bus
            .publish(topic::SESSION_STARTED, "session_controller", SessionEvent::Started { session_id: session_id.clone() })
            .await;

        Ok(session_id)
    }

    /// Deactivates every `(strategy, symbol)` pair the session claimed. Does not close open
    /// positions unless `close_positions` is set, matching the evaluator's own ownership of
    /// that decision (see `StrategyManager::deactivate`).
    pub async fn stop(&self, session_id: &SessionId, close_positions: bool) -> Result<(), SessionError> {
        let session = self.status(session_id).await?;
        self.set_status(session_id, SessionStatus::Stopping).await;

        for strategy_id in &session.strategies {
            for symbol in &session.symbols {
                let key = InstanceKey::new(strategy_id.clone(), symbol.clone());
                self.manager.deactivate(&key, close_positions).await;
            }
        }

        self.set_status(session_id, SessionStatus::Stopped).await;
        self.session_bus
            .publish(topic::SESSION_STOPPED, "session_controller", SessionEvent::Stopped { session_id: session_id.clone() })
            .await;
        Ok(())
    }

    async fn set_status(&self, session_id: &SessionId, status: SessionStatus) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.status = status;
        }
    }

    async fn set_degraded(&self, session_id: &SessionId, degraded: bool) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.degraded = degraded;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionMode;
    use ironflow_core::{StrategyId, Symbol};
    use ironflow_execution::PaperExecutionClient;
    use ironflow_indicator::VariantCatalog;
    use ironflow_strategy::store::InMemoryStrategyStore;

    fn controller() -> SessionController {
        let catalog = Arc::new(VariantCatalog::new());
        let store = Arc::new(InMemoryStrategyStore::new(catalog.clone()));
        let order_bus = Arc::new(EventBus::default());
        let position_bus = Arc::new(EventBus::default());
        let execution = Arc::new(PaperExecutionClient::new(Default::default(), order_bus.clone(), position_bus.clone()));
        let manager = Arc::new(StrategyManager::new(
            store,
            catalog,
            Arc::new(EventBus::default()),
            order_bus,
            position_bus,
            Arc::new(EventBus::default()),
            execution,
            10_000.0,
        ));
        SessionController::new(manager, Arc::new(EventBus::default()), Config::default())
    }

    fn request(mode: SessionMode, symbol: &str, idempotent: bool) -> SessionRequest {
        SessionRequest {
            mode,
            symbols: vec![Symbol::new(symbol)],
            strategies: vec![],
            budget_cap: 1_000.0,
            idempotent,
        }
    }

    #[tokio::test]
    async fn start_with_no_strategies_succeeds_trivially() {
        let controller = controller();
        let id = controller.start(request(SessionMode::Paper, "BTCUSDT", false)).await.unwrap();
        let status = controller.status(&id).await.unwrap();
        assert_eq!(status.status, SessionStatus::Running);
    }

    #[tokio::test]
    async fn higher_priority_session_refuses_overlapping_lower_priority_start() {
        let controller = controller();
        controller.start(request(SessionMode::Live, "ETHUSDT", false)).await.unwrap();

        let result = controller.start(request(SessionMode::Paper, "ETHUSDT", false)).await;
        assert!(matches!(result, Err(SessionError::Conflict { .. })));
    }

    #[tokio::test]
    async fn idempotent_start_returns_existing_session_on_conflict() {
        let controller = controller();
        let first = controller.start(request(SessionMode::Live, "SOLUSDT", false)).await.unwrap();

        let second = controller.start(request(SessionMode::Live, "SOLUSDT", true)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_strategy_activation_fails_and_does_not_prevent_trivial_sessions() {
        let controller = controller();
        let mut req = request(SessionMode::Paper, "BTCUSDT", false);
        req.strategies = vec![StrategyId::new("unknown")];
        let result = controller.start(req).await;
        assert!(matches!(result, Err(SessionError::Fatal(_))));
    }

    #[tokio::test]
    async fn stop_unknown_session_is_not_found() {
        let controller = controller();
        let result = controller.stop(&SessionId::new("nope"), false).await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    /// A `StrategyStore` that delays `list()` to simulate a cold cache: catches a real
    /// class of bug where `activate` would run before the strategy cache finished loading.
    struct SlowStore {
        inner: Arc<InMemoryStrategyStore>,
        delay: std::time::Duration,
    }

    #[async_trait::async_trait]
    impl ironflow_strategy::StrategyStore for SlowStore {
        async fn create(&self, strategy: ironflow_strategy::Strategy) -> Result<(), ironflow_strategy::StoreError> {
            self.inner.create(strategy).await
        }
        async fn update(&self, strategy: ironflow_strategy::Strategy) -> Result<(), ironflow_strategy::StoreError> {
            self.inner.update(strategy).await
        }
        async fn read(&self, id: &ironflow_core::StrategyId) -> Result<ironflow_strategy::Strategy, ironflow_strategy::StoreError> {
            self.inner.read(id).await
        }
        async fn list(&self, filter: &ironflow_strategy::StrategyFilter) -> Vec<ironflow_strategy::Strategy> {
            tokio::time::sleep(self.delay).await;
            self.inner.list(filter).await
        }
        async fn delete(&self, id: &ironflow_core::StrategyId) -> Result<(), ironflow_strategy::StoreError> {
            self.inner.delete(id).await
        }
        async fn get_enabled(&self) -> Vec<ironflow_strategy::Strategy> {
            self.inner.get_enabled().await
        }
    }

    #[tokio::test]
    async fn activation_waits_for_a_slow_cache_warm_before_start_returns() {
        use crate::session::SessionMode;
        use ironflow_core::StrategyId;
        use ironflow_strategy::condition::{ComparisonTarget, Condition, Operator};
        use ironflow_strategy::strategy::{
            Direction, EmergencyExit, GlobalLimits, O1Cancel, PositionSize, S1Signal, Strategy, Ze1Close, Z1Entry,
        };

        let mut catalog = VariantCatalog::new();
        let variant = ironflow_indicator::IndicatorVariant::new(
            "rsi_14",
            "RSI",
            ironflow_indicator::catalog::params(&[("window_ms", 60_000.0)]),
        );
        catalog
            .register(variant, ironflow_indicator::catalog::OutputShape::Scalar, ironflow_indicator::builtin::rsi_factory)
            .unwrap();
        let catalog = Arc::new(catalog);

        let condition = || Condition {
            id: "c1".into(),
            variant_id: ironflow_core::VariantId::from("rsi_14"),
            operator: Operator::Gt,
            target: ComparisonTarget::Scalar(0.0),
            duration_ms: None,
            window_ms: None,
        };
        let strategy_id = StrategyId::from("slow_cache_strategy");
        let strategy = Strategy {
            strategy_id: strategy_id.clone(),
            strategy_name: "slow_cache_strategy".into(),
            direction: Direction::Long,
            enabled: true,
            s1_signal: S1Signal { conditions: vec![condition()] },
            o1_cancel: O1Cancel { timeout_seconds: 60, conditions: vec![], cooldown_minutes: 1 },
            z1_entry: Z1Entry {
                conditions: vec![condition()],
                position_size: PositionSize::Fixed { value: 100.0 },
                leverage: 2.0,
                stop_loss: None,
                take_profit: None,
            },
            ze1_close: Ze1Close { conditions: vec![condition()] },
            emergency_exit: EmergencyExit { conditions: vec![], cooldown_minutes: 60 },
            global_limits: GlobalLimits {
                max_daily_trades: 10,
                daily_loss_limit_pct: 3.0,
                max_concurrent_positions: 1,
                cooldown_minutes: 5,
                max_leverage: 10.0,
            },
        };

        let inner_store = Arc::new(InMemoryStrategyStore::new(catalog.clone()));
        inner_store.create(strategy).await.unwrap();
        let store: Arc<dyn ironflow_strategy::StrategyStore> =
            Arc::new(SlowStore { inner: inner_store, delay: std::time::Duration::from_millis(150) });

        let order_bus = Arc::new(EventBus::default());
        let position_bus = Arc::new(EventBus::default());
        let execution = Arc::new(ironflow_execution::PaperExecutionClient::new(
            Default::default(),
            order_bus.clone(),
            position_bus.clone(),
        ));
        let manager = Arc::new(StrategyManager::new(
            store,
            catalog,
            Arc::new(EventBus::default()),
            order_bus,
            position_bus,
            Arc::new(EventBus::default()),
            execution,
            10_000.0,
        ));
        let controller = SessionController::new(manager.clone(), Arc::new(EventBus::default()), Config::default());

        let request = SessionRequest {
            mode: SessionMode::Paper,
            symbols: vec![ironflow_core::Symbol::new("BTCUSDT")],
            strategies: vec![strategy_id.clone()],
            budget_cap: 1_000.0,
            idempotent: false,
        };

        controller.start(request).await.unwrap();

        let key = ironflow_core::InstanceKey::new(strategy_id, ironflow_core::Symbol::new("BTCUSDT"));
        assert!(manager.is_active(&key), "activation must have completed before start() returned");
    }
}
