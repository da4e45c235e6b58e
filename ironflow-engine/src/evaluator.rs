//! The per-`(strategy_id, symbol)` evaluator: one logical task, single-writer to its own
//! [`StrategyInstance`], reacting to indicator/order/position events with E1 preemption
//! checked ahead of the ordinary section dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use ironflow_bus::{topic, Delivery, EventBus, Subscriber};
use ironflow_core::{OrderId, Timestamp, VariantId};
use ironflow_execution::{ExecutionClient, Order, OrderEvent, OrderSide, OrderType, PositionEvent};
use ironflow_indicator::IndicatorValue;
use ironflow_risk::{GlobalLimitsContext, GlobalLimitsGuard};
use ironflow_strategy::condition::{Condition, ConditionState};
use ironflow_strategy::{Direction, PositionSize, Strategy};

use crate::event::EngineEvent;
use crate::instance::{Signal, State, StrategyInstance};
use crate::timer;

pub struct Evaluator {
    pub strategy: Arc<Strategy>,
    pub instance: Arc<tokio::sync::Mutex<StrategyInstance>>,
    pub indicator_sub: Subscriber<IndicatorValue>,
    pub order_sub: Subscriber<OrderEvent>,
    pub position_sub: Subscriber<PositionEvent>,
    pub execution: Arc<dyn ExecutionClient>,
    pub engine_bus: Arc<EventBus<EngineEvent>>,
    pub session_budget_cap: f64,
    condition_states: HashMap<String, ConditionState>,
    condition_truth: HashMap<String, bool>,
}

impl Evaluator {
    pub fn new(
        strategy: Arc<Strategy>,
        instance: Arc<tokio::sync::Mutex<StrategyInstance>>,
        indicator_sub: Subscriber<IndicatorValue>,
        order_sub: Subscriber<OrderEvent>,
        position_sub: Subscriber<PositionEvent>,
        execution: Arc<dyn ExecutionClient>,
        engine_bus: Arc<EventBus<EngineEvent>>,
        session_budget_cap: f64,
    ) -> Self {
        Self {
            strategy,
            instance,
            indicator_sub,
            order_sub,
            position_sub,
            execution,
            engine_bus,
            session_budget_cap,
            condition_states: HashMap::new(),
            condition_truth: HashMap::new(),
        }
    }

    fn all_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.strategy
            .s1_signal
            .conditions
            .iter()
            .chain(self.strategy.o1_cancel.conditions.iter())
            .chain(self.strategy.z1_entry.conditions.iter())
            .chain(self.strategy.ze1_close.conditions.iter())
            .chain(self.strategy.emergency_exit.conditions.iter())
    }

    fn on_value(&mut self, ts: Timestamp, variant_id: &VariantId, value: f64) {
        let matching: Vec<Condition> =
            self.all_conditions().filter(|c| &c.variant_id == variant_id).cloned().collect();
        for condition in matching {
            let state = self.condition_states.entry(condition.id.clone()).or_default();
            let truth = state.observe(&condition, ts, value);
            self.condition_truth.insert(condition.id.clone(), truth);
        }
    }

    fn truth_of(&self, condition: &Condition) -> bool {
        *self.condition_truth.get(&condition.id).unwrap_or(&false)
    }

    /// AND semantics. An empty condition list is never satisfied — it means the section
    /// has nothing configured to observe yet, not a vacuous pass.
    fn all_true(&self, conditions: &[Condition]) -> bool {
        !conditions.is_empty() && conditions.iter().all(|c| self.truth_of(c))
    }

    fn any_true(&self, conditions: &[Condition]) -> bool {
        conditions.iter().any(|c| self.truth_of(c))
    }

    fn triggering_values(&self, conditions: &[Condition]) -> IndexMap<VariantId, f64> {
        let mut values = IndexMap::new();
        for condition in conditions {
            if let Some(value) = self.condition_states.get(&condition.id).and_then(|s| s.last_value()) {
                values.insert(condition.variant_id.clone(), value);
            }
        }
        values
    }

    async fn transition_and_emit(&self, instance: &mut StrategyInstance, to: State, ts: Timestamp) {
        let from = instance.state;
        instance.transition_to(to, ts);
        self.engine_bus
            .publish(
                topic::STATE_MACHINE_TRANSITION,
                "evaluator",
                EngineEvent::StateMachineTransition { instance_key: instance.key(), from, to },
            )
            .await;
    }

    async fn enter_cooldown(&self, instance: &mut StrategyInstance, section_cooldown_minutes: u64, ts: Timestamp) {
        let minutes = section_cooldown_minutes.max(self.strategy.global_limits.cooldown_minutes);
        instance.cooldown_until = Some(ts.saturating_add_millis((minutes as i64) * 60_000));
        self.transition_and_emit(instance, State::Cooldown, ts).await;
    }

    async fn cancel_signal(&self, instance: &mut StrategyInstance, ts: Timestamp) {
        instance.active_signal = None;
        self.transition_and_emit(instance, State::SignalCancelled, ts).await;
        self.engine_bus
            .publish(
                topic::SIGNAL_CANCELLED,
                "evaluator",
                EngineEvent::SignalCancelled { instance_key: instance.key() },
            )
            .await;
        self.enter_cooldown(instance, self.strategy.o1_cancel.cooldown_minutes, ts).await;
    }

    fn entry_qty(&self) -> f64 {
        match self.strategy.z1_entry.position_size {
            PositionSize::Fixed { value } => value,
            PositionSize::Percentage { value } => self.session_budget_cap * value / 100.0,
        }
    }

    async fn submit_entry(&self, instance: &mut StrategyInstance, ts: Timestamp) {
        let ctx = GlobalLimitsContext {
            daily_trades_count: instance.daily_trades_count,
            daily_pnl_pct: instance.daily_pnl_pct,
            concurrent_positions: u32::from(instance.open_position_id.is_some()),
            requested_leverage: self.strategy.z1_entry.leverage,
        };
        let guard = GlobalLimitsGuard::new(&self.strategy.global_limits);
        if let Err(refused) = guard.check((), &ctx) {
            self.engine_bus
                .publish(
                    topic::ENTRY_CONDITIONS_FAILED,
                    "evaluator",
                    EngineEvent::EntryConditionsFailed {
                        instance_key: instance.key(),
                        reason_code: refused.reason.reason_code().to_string(),
                    },
                )
                .await;
            self.enter_cooldown(instance, self.strategy.global_limits.cooldown_minutes, ts).await;
            return;
        }

        let side = match self.strategy.direction {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Short,
        };
        let order_id = OrderId::new(format!("{}-{}-entry-{}", instance.strategy_id, instance.symbol, ts.as_nanos()));
        let signal_id = instance.active_signal.as_ref().map(|s| s.signal_id.clone());
        let order = Order::new(
            order_id.clone(),
            signal_id,
            instance.strategy_id.clone(),
            instance.symbol.clone(),
            side,
            OrderType::Market,
            self.entry_qty(),
            None,
            self.strategy.z1_entry.leverage,
            ts,
        );
        match self.execution.submit(order).await {
            Ok(order_id) => {
                instance.pending_order_id = Some(order_id.clone());
                self.transition_and_emit(instance, State::EntryEvaluation, ts).await;
                self.engine_bus
                    .publish(
                        topic::ENTRY_SUBMITTED,
                        "evaluator",
                        EngineEvent::EntrySubmitted { instance_key: instance.key(), order_id },
                    )
                    .await;
            }
            Err(_) => {
                self.enter_cooldown(instance, self.strategy.global_limits.cooldown_minutes, ts).await;
            }
        }
    }

    async fn submit_close(&self, instance: &mut StrategyInstance, ts: Timestamp, is_emergency: bool) {
        if instance.pending_order_id.is_some() {
            instance.pending_close_is_emergency |= is_emergency;
            return;
        }
        let side = match self.strategy.direction {
            Direction::Long => OrderSide::Sell,
            Direction::Short => OrderSide::Cover,
        };
        let order_id = OrderId::new(format!("{}-{}-close-{}", instance.strategy_id, instance.symbol, ts.as_nanos()));
        let order = Order::new(
            order_id.clone(),
            instance.active_signal.as_ref().map(|s| s.signal_id.clone()),
            instance.strategy_id.clone(),
            instance.symbol.clone(),
            side,
            OrderType::Market,
            instance.open_qty.unwrap_or(0.0),
            None,
            self.strategy.z1_entry.leverage,
            ts,
        );
        instance.pending_close_is_emergency = is_emergency;
        if let Ok(order_id) = self.execution.submit(order).await {
            instance.pending_order_id = Some(order_id);
        }
    }

    async fn evaluate_sections(&self, instance: &mut StrategyInstance, ts: Timestamp) {
        if matches!(instance.state, State::SignalDetected | State::PositionActive)
            && self.any_true(&self.strategy.emergency_exit.conditions)
        {
            if matches!(instance.state, State::PositionActive) {
                self.submit_close(instance, ts, true).await;
            } else {
                // No position to close yet: emergency preempts O1/Z1 outright rather than
                // routing through an order that would close a zero-qty position.
                instance.active_signal = None;
                self.transition_and_emit(instance, State::EmergencyExit, ts).await;
                self.enter_cooldown(instance, self.strategy.emergency_exit.cooldown_minutes, ts).await;
            }
            return;
        }

        match instance.state {
            State::Monitoring => {
                if !instance.is_in_cooldown(ts) && self.all_true(&self.strategy.s1_signal.conditions) {
                    let signal = Signal {
                        signal_id: ironflow_core::SignalId::new(format!(
                            "{}-{}-{}",
                            instance.strategy_id,
                            instance.symbol,
                            ts.as_nanos()
                        )),
                        strategy_id: instance.strategy_id.clone(),
                        symbol: instance.symbol.clone(),
                        ts,
                        triggering_values: self.triggering_values(&self.strategy.s1_signal.conditions),
                    };
                    instance.active_signal = Some(signal.clone());
                    self.transition_and_emit(instance, State::SignalDetected, ts).await;
                    self.engine_bus.publish(topic::SIGNAL_DETECTED, "evaluator", EngineEvent::SignalDetected(signal)).await;
                }
            }
            State::SignalDetected => {
                if self.any_true(&self.strategy.o1_cancel.conditions) {
                    self.cancel_signal(instance, ts).await;
                } else if self.all_true(&self.strategy.z1_entry.conditions) {
                    self.submit_entry(instance, ts).await;
                }
            }
            State::PositionActive => {
                if self.any_true(&self.strategy.ze1_close.conditions) {
                    self.submit_close(instance, ts, false).await;
                }
            }
            _ => {}
        }
    }

    async fn handle_indicator(&mut self, delivery: Delivery<IndicatorValue>) {
        let envelope = match delivery {
            Delivery::Item(envelope) => envelope,
            Delivery::Gap(gap) => {
                tracing::warn!(dropped_total = gap.dropped_total, "evaluator observed a gap on indicator input");
                return;
            }
        };
        let value = envelope.payload;
        let mut instance = self.instance.lock().await;
        if value.symbol != instance.symbol {
            return;
        }
        let Some(scalar) = value.value.as_scalar() else { return };
        self.on_value(value.ts, &value.variant_id, scalar);
        self.evaluate_sections(&mut instance, value.ts).await;
    }

    async fn handle_order(&self, delivery: Delivery<OrderEvent>) {
        let envelope = match delivery {
            Delivery::Item(envelope) => envelope,
            Delivery::Gap(gap) => {
                tracing::warn!(dropped_total = gap.dropped_total, "evaluator observed a gap on order input");
                return;
            }
        };
        let event = envelope.payload;
        let mut instance = self.instance.lock().await;
        if instance.pending_order_id.as_ref() != Some(event.order_id()) {
            return;
        }
        match event {
            OrderEvent::Filled { filled_qty, .. } => match instance.state {
                State::EntryEvaluation => {
                    instance.open_qty = Some(filled_qty);
                    instance.daily_trades_count += 1;
                    instance.pending_order_id = None;
                    self.transition_and_emit(&mut instance, State::PositionActive, envelope.ts).await;
                }
                State::PositionActive => {
                    instance.pending_order_id = None;
                    let is_emergency = instance.pending_close_is_emergency;
                    instance.pending_close_is_emergency = false;
                    instance.open_qty = None;
                    let target = if is_emergency { State::EmergencyExit } else { State::Exited };
                    self.transition_and_emit(&mut instance, target, envelope.ts).await;
                    let section_cooldown =
                        if is_emergency { self.strategy.emergency_exit.cooldown_minutes } else { 0 };
                    self.enter_cooldown(&mut instance, section_cooldown, envelope.ts).await;
                }
                _ => {}
            },
            OrderEvent::Rejected { .. } | OrderEvent::Failed { .. } => {
                instance.pending_order_id = None;
                instance.pending_close_is_emergency = false;
                if matches!(instance.state, State::EntryEvaluation) {
                    self.enter_cooldown(&mut instance, self.strategy.global_limits.cooldown_minutes, envelope.ts).await;
                }
            }
            _ => {}
        }
    }

    async fn handle_position(&self, delivery: Delivery<PositionEvent>) {
        let envelope = match delivery {
            Delivery::Item(envelope) => envelope,
            Delivery::Gap(_) => return,
        };
        let mut instance = self.instance.lock().await;
        match envelope.payload {
            PositionEvent::Opened { position_id } => instance.open_position_id = Some(position_id),
            PositionEvent::Closed { position_id, realized_pnl } => {
                if instance.open_position_id.as_ref() == Some(&position_id) {
                    // realized_pnl is an absolute currency amount; daily_pnl_pct is compared
                    // against a percentage limit (ironflow-risk), so scale it by the same
                    // session_budget_cap denominator used for percentage-based entry sizing.
                    instance.daily_pnl_pct += (realized_pnl / self.session_budget_cap) * 100.0;
                    instance.open_position_id = None;
                }
            }
            PositionEvent::Updated { .. } => {}
        }
    }

    async fn handle_deadline(&self, state: State) {
        let mut instance = self.instance.lock().await;
        let now = Timestamp::now();
        match state {
            State::SignalDetected => self.cancel_signal(&mut instance, now).await,
            State::Cooldown if !instance.is_in_cooldown(now) => {
                instance.cooldown_until = None;
                self.transition_and_emit(&mut instance, State::Monitoring, now).await;
            }
            _ => {}
        }
    }

    /// Runs until the indicator subscription is closed and fully drained.
    pub async fn run(mut self) {
        loop {
            let (state, entered_at, cooldown_until) = {
                let instance = self.instance.lock().await;
                (instance.state, instance.state_entered_at, instance.cooldown_until)
            };

            let deadline = match state {
                // timeout_seconds=0 disables the O1 timer outright: only its conditions
                // (if any) can cancel the pending signal, not a deadline.
                State::SignalDetected if self.strategy.o1_cancel.timeout_seconds == 0 => None,
                State::SignalDetected => {
                    Some(timer::remaining_until(entered_at, Duration::from_secs(self.strategy.o1_cancel.timeout_seconds), Timestamp::now()))
                }
                State::Cooldown => cooldown_until.map(|until| until.duration_since(Timestamp::now()).unwrap_or(Duration::ZERO)),
                _ => None,
            };

            tokio::select! {
                biased;
                maybe = self.indicator_sub.recv() => {
                    match maybe {
                        None => break,
                        Some(delivery) => self.handle_indicator(delivery).await,
                    }
                }
                maybe = self.order_sub.recv(), if !self.order_sub.is_closed() => {
                    if let Some(delivery) = maybe { self.handle_order(delivery).await; }
                }
                maybe = self.position_sub.recv(), if !self.position_sub.is_closed() => {
                    if let Some(delivery) = maybe { self.handle_position(delivery).await; }
                }
                _ = timer::sleep_for(deadline.unwrap_or(Duration::MAX)), if deadline.is_some() => {
                    self.handle_deadline(state).await;
                }
            }
        }
    }
}

/// End-to-end scenarios driving the state machine through synthetic indicator/market
/// events, rather than unit-testing individual sections in isolation.
#[cfg(test)]
mod scenario_tests {
    use super::*;
    use ironflow_bus::subscription::SlowConsumerPolicy;
    use ironflow_core::{StrategyId, Symbol};
    use ironflow_execution::{PaperExecutionClient, PaperExecutionConfig};
    use ironflow_market::event::{MarketEvent, Tick};
    use ironflow_strategy::condition::{ComparisonTarget, Condition, Operator};
    use ironflow_strategy::{Direction, EmergencyExit, GlobalLimits, O1Cancel, PositionSize, S1Signal, Ze1Close, Z1Entry};

    fn condition(id: &str, variant_id: &str, operator: Operator, target: f64) -> Condition {
        Condition {
            id: id.to_string(),
            variant_id: VariantId::from(variant_id),
            operator,
            target: ComparisonTarget::Scalar(target),
            duration_ms: None,
            window_ms: None,
        }
    }

    fn pump_strategy() -> Arc<Strategy> {
        Arc::new(Strategy {
            strategy_id: StrategyId::from("pump_strategy"),
            strategy_name: "pump".into(),
            direction: Direction::Long,
            enabled: true,
            s1_signal: S1Signal { conditions: vec![condition("s1", "pump_magnitude_pct", Operator::Gte, 7.0)] },
            o1_cancel: O1Cancel { timeout_seconds: 60, conditions: vec![], cooldown_minutes: 1 },
            z1_entry: Z1Entry {
                conditions: vec![condition("z1", "rsi_14", Operator::Lte, 80.0)],
                position_size: PositionSize::Fixed { value: 10.0 },
                leverage: 3.0,
                stop_loss: None,
                take_profit: None,
            },
            ze1_close: Ze1Close { conditions: vec![condition("ze1", "pnl_pct", Operator::Gte, 10.0)] },
            emergency_exit: EmergencyExit {
                conditions: vec![condition("e1", "pnl_pct", Operator::Lte, -50.0)],
                cooldown_minutes: 60,
            },
            global_limits: GlobalLimits {
                max_daily_trades: 10,
                daily_loss_limit_pct: 50.0,
                max_concurrent_positions: 1,
                cooldown_minutes: 0,
                max_leverage: 10.0,
            },
        })
    }

    struct Harness {
        instance: Arc<tokio::sync::Mutex<StrategyInstance>>,
        indicator_bus: Arc<EventBus<IndicatorValue>>,
        market_bus: Arc<EventBus<MarketEvent>>,
        execution: Arc<PaperExecutionClient>,
    }

    fn spawn_harness(strategy: Arc<Strategy>, symbol: Symbol) -> Harness {
        let indicator_bus: Arc<EventBus<IndicatorValue>> = Arc::new(EventBus::default());
        let order_bus: Arc<EventBus<OrderEvent>> = Arc::new(EventBus::default());
        let position_bus: Arc<EventBus<PositionEvent>> = Arc::new(EventBus::default());
        let market_bus: Arc<EventBus<MarketEvent>> = Arc::new(EventBus::default());
        let engine_bus: Arc<EventBus<EngineEvent>> = Arc::new(EventBus::default());

        let execution =
            Arc::new(PaperExecutionClient::new(PaperExecutionConfig::default(), order_bus.clone(), position_bus.clone()));
        let market_sub = market_bus.subscribe("market.*", topic::MARKET_PRICE_UPDATE, 256, SlowConsumerPolicy::DropOldest);
        tokio::spawn(execution.clone().run(market_sub));

        let instance = Arc::new(tokio::sync::Mutex::new(StrategyInstance::new(
            strategy.strategy_id.clone(),
            symbol,
            Timestamp::now(),
        )));
        let indicator_sub = indicator_bus.subscribe(topic::INDICATOR_UPDATED, topic::INDICATOR_UPDATED, 256, SlowConsumerPolicy::DropOldest);
        let order_sub = order_bus.subscribe("order.*", topic::ORDER_FILLED, 256, SlowConsumerPolicy::DropOldest);
        let position_sub = position_bus.subscribe("position.*", topic::POSITION_UPDATED, 256, SlowConsumerPolicy::DropOldest);

        let evaluator = Evaluator::new(
            strategy,
            instance.clone(),
            indicator_sub,
            order_sub,
            position_sub,
            execution.clone() as Arc<dyn ExecutionClient>,
            engine_bus,
            10_000.0,
        );
        tokio::spawn(evaluator.run());

        Harness { instance, indicator_bus, market_bus, execution }
    }

    async fn publish_indicator(bus: &EventBus<IndicatorValue>, symbol: &Symbol, variant_id: &str, value: f64) {
        bus.publish(
            topic::INDICATOR_UPDATED,
            "test",
            IndicatorValue {
                variant_id: VariantId::from(variant_id),
                symbol: symbol.clone(),
                ts: Timestamp::now(),
                value: ironflow_indicator::IndicatorOutput::Scalar(value),
                metadata: IndexMap::new(),
            },
        )
        .await;
    }

    async fn publish_tick(bus: &EventBus<MarketEvent>, symbol: &Symbol, price: f64) {
        bus.publish(
            topic::MARKET_PRICE_UPDATE,
            "test",
            MarketEvent::Tick {
                symbol: symbol.clone(),
                tick: Tick {
                    symbol_idx: 0,
                    ts: Timestamp::now(),
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: 1.0,
                    trades_count: 1,
                    vwap: None,
                },
            },
        )
        .await;
    }

    async fn wait_for_state(instance: &Arc<tokio::sync::Mutex<StrategyInstance>>, expected: State) -> bool {
        for _ in 0..300 {
            if instance.lock().await.state == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn pump_signal_runs_end_to_end_to_cooldown() {
        let symbol = Symbol::new("BTCUSDT");
        let strategy = pump_strategy();
        let harness = spawn_harness(strategy, symbol.clone());

        publish_indicator(&harness.indicator_bus, &symbol, "pump_magnitude_pct", 8.0).await;
        assert!(wait_for_state(&harness.instance, State::SignalDetected).await);

        publish_indicator(&harness.indicator_bus, &symbol, "rsi_14", 50.0).await;
        assert!(wait_for_state(&harness.instance, State::EntryEvaluation).await);

        publish_tick(&harness.market_bus, &symbol, 100.0).await;
        assert!(wait_for_state(&harness.instance, State::PositionActive).await);
        assert_eq!(harness.execution.open_positions().len(), 1);

        publish_indicator(&harness.indicator_bus, &symbol, "pnl_pct", 11.0).await;
        publish_tick(&harness.market_bus, &symbol, 110.0).await;

        assert!(wait_for_state(&harness.instance, State::Monitoring).await);
        assert!(harness.execution.open_positions().is_empty());
    }

    #[tokio::test]
    async fn emergency_exit_preempts_entry_while_signal_is_pending() {
        let symbol = Symbol::new("ETHUSDT");
        let strategy = pump_strategy();
        let harness = spawn_harness(strategy, symbol.clone());

        publish_indicator(&harness.indicator_bus, &symbol, "pump_magnitude_pct", 8.0).await;
        assert!(wait_for_state(&harness.instance, State::SignalDetected).await);

        // E1 fires first; Z1 becoming true right behind it must not still trigger an entry.
        publish_indicator(&harness.indicator_bus, &symbol, "pnl_pct", -60.0).await;
        publish_indicator(&harness.indicator_bus, &symbol, "rsi_14", 50.0).await;

        assert!(wait_for_state(&harness.instance, State::Cooldown).await);
        assert!(harness.execution.open_positions().is_empty());
        let instance = harness.instance.lock().await;
        assert!(instance.pending_order_id.is_none());
    }
}
