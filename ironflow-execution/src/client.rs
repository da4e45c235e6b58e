//! [`ExecutionClient`] and its paper-trading implementation: a per-order entry in a
//! `DashMap` stands in for the per-order mini-actor, since dashmap already serializes
//! access to a single key behind its own shard lock.

use async_trait::async_trait;
use dashmap::DashMap;
use ironflow_bus::{bus::EventBus, event::Delivery, subscription::Subscriber, topic};
use ironflow_core::{OrderId, PositionId, StrategyId, Symbol, Timestamp};
use ironflow_market::event::MarketEvent;
use ironflow_strategy::Direction;
use std::sync::Arc;

use crate::error::ExecutionError;
use crate::order::{Order, OrderEvent, OrderSide, OrderStatus, OrderType};
use crate::position::{Position, PositionEvent};

#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn submit(&self, order: Order) -> Result<OrderId, ExecutionError>;
    async fn cancel(&self, order_id: &OrderId) -> Result<(), ExecutionError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperExecutionConfig {
    pub slippage_bps: f64,
    pub commission_bps: f64,
    pub min_qty: f64,
    pub budget_cap: f64,
}

impl Default for PaperExecutionConfig {
    fn default() -> Self {
        Self { slippage_bps: 5.0, commission_bps: 2.0, min_qty: 0.0001, budget_cap: f64::INFINITY }
    }
}

fn mid_price_of(event: &MarketEvent) -> Option<(Symbol, Timestamp, f64)> {
    match event {
        MarketEvent::Tick { symbol, tick } => Some((symbol.clone(), tick.ts, tick.close)),
        MarketEvent::Trade { symbol, trade } => Some((symbol.clone(), trade.ts, trade.price)),
        MarketEvent::Orderbook { symbol, snapshot } => {
            snapshot.mid().map(|mid| (symbol.clone(), snapshot.ts, mid))
        }
        MarketEvent::Reconnected { .. } => None,
    }
}

/// Buys/opening-shorts fill above mid, sells/covers fill below mid — slippage always works
/// against the order, never in its favour.
fn fill_price(side: OrderSide, mid: f64, slippage_bps: f64) -> f64 {
    let adj = mid * slippage_bps / 10_000.0;
    match side {
        OrderSide::Buy | OrderSide::Short => mid + adj,
        OrderSide::Sell | OrderSide::Cover => mid - adj,
    }
}

/// Paper trading order manager: no venue exists, so every `MARKET` order fills in full on
/// the next price update for its symbol at mid plus configured slippage.
pub struct PaperExecutionClient {
    config: PaperExecutionConfig,
    orders: DashMap<OrderId, Order>,
    pending_by_symbol: DashMap<Symbol, Vec<OrderId>>,
    positions: DashMap<PositionId, Position>,
    open_position_by_key: DashMap<(StrategyId, Symbol), PositionId>,
    order_out: Arc<EventBus<OrderEvent>>,
    position_out: Arc<EventBus<PositionEvent>>,
    next_position_seq: std::sync::atomic::AtomicU64,
}

impl std::fmt::Debug for PaperExecutionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperExecutionClient")
            .field("orders_tracked", &self.orders.len())
            .field("open_positions", &self.positions.len())
            .finish()
    }
}

impl PaperExecutionClient {
    pub fn new(
        config: PaperExecutionConfig,
        order_out: Arc<EventBus<OrderEvent>>,
        position_out: Arc<EventBus<PositionEvent>>,
    ) -> Self {
        Self {
            config,
            orders: DashMap::new(),
            pending_by_symbol: DashMap::new(),
            positions: DashMap::new(),
            open_position_by_key: DashMap::new(),
            order_out,
            position_out,
            next_position_seq: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn order(&self, order_id: &OrderId) -> Option<Order> {
        self.orders.get(order_id).map(|r| r.clone())
    }

    pub fn position(&self, position_id: &PositionId) -> Option<Position> {
        self.positions.get(position_id).map(|r| r.clone())
    }

    /// Every position still open, for reporting (e.g. a replay/backtest summary) rather
    /// than for anything on the hot fill path.
    pub fn open_positions(&self) -> Vec<Position> {
        self.positions.iter().map(|r| r.value().clone()).collect()
    }

    fn next_position_id(&self) -> PositionId {
        let n = self.next_position_seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        PositionId::new(format!("pos-{n}"))
    }

    fn validate(&self, order: &Order) -> Result<(), ExecutionError> {
        if order.qty < self.config.min_qty {
            return Err(ExecutionError::Rejected {
                order_id: order.order_id.clone(),
                reason: format!("qty {} below minimum {}", order.qty, self.config.min_qty),
            });
        }
        if order.qty * order.limit_price.unwrap_or(1.0) > self.config.budget_cap {
            return Err(ExecutionError::Rejected {
                order_id: order.order_id.clone(),
                reason: "order would exceed session budget cap".into(),
            });
        }
        Ok(())
    }

    /// Drives every pending order and open position for `symbol` forward using the latest
    /// mid price: market orders fill in full, armed SL/TP brackets close their position.
    async fn process_price(&self, symbol: &Symbol, mid: f64, ts: Timestamp) {
        let pending_ids = self.pending_by_symbol.get(symbol).map(|v| v.clone()).unwrap_or_default();
        let mut still_pending = Vec::new();
        for order_id in pending_ids {
            let Some(mut entry) = self.orders.get_mut(&order_id) else { continue };
            if entry.status.is_terminal() {
                continue;
            }
            if entry.order_type != OrderType::Market {
                still_pending.push(order_id.clone());
                continue;
            }
            let price = fill_price(entry.side, mid, self.config.slippage_bps);
            let commission = entry.qty * price * self.config.commission_bps / 10_000.0;
            entry.filled_qty = entry.qty;
            entry.filled_price = price;
            entry.commission = commission;
            entry.slippage = (price - mid).abs();
            let _ = entry.apply_status(OrderStatus::Filled, ts);
            let order = entry.clone();
            drop(entry);

            self.order_out
                .publish(
                    topic::ORDER_FILLED,
                    "paper_execution",
                    OrderEvent::Filled {
                        order_id: order.order_id.clone(),
                        filled_qty: order.filled_qty,
                        filled_price: order.filled_price,
                        commission: order.commission,
                        slippage: order.slippage,
                    },
                )
                .await;

            if order.is_opening() {
                self.open_position(&order, ts).await;
            } else {
                self.close_position(&order, ts).await;
            }
        }
        self.pending_by_symbol.insert(symbol.clone(), still_pending);

        let keys: Vec<(StrategyId, Symbol)> =
            self.open_position_by_key.iter().filter(|e| &e.key().1 == symbol).map(|e| e.key().clone()).collect();
        for key in keys {
            let Some(position_id) = self.open_position_by_key.get(&key).map(|r| r.clone()) else { continue };
            let Some(mut position) = self.positions.get_mut(&position_id) else { continue };
            position.mark(mid);
            self.position_out
                .publish(
                    topic::POSITION_UPDATED,
                    "paper_execution",
                    PositionEvent::Updated { position_id: position.position_id.clone(), unrealized_pnl: position.unrealized_pnl },
                )
                .await;
            if position.bracket_triggered(mid).is_some() {
                let realized = position.unrealized_pnl;
                let position_id = position.position_id.clone();
                drop(position);
                self.positions.remove(&position_id);
                self.open_position_by_key.remove(&key);
                self.position_out
                    .publish(topic::POSITION_UPDATED, "paper_execution", PositionEvent::Closed { position_id, realized_pnl: realized })
                    .await;
            }
        }
    }

    async fn open_position(&self, order: &Order, ts: Timestamp) {
        let side = match order.side {
            OrderSide::Buy => Direction::Long,
            OrderSide::Short => Direction::Short,
            _ => return,
        };
        let position_id = self.next_position_id();
        let position = Position::open(
            position_id.clone(),
            order.strategy_id.clone(),
            order.symbol.clone(),
            side,
            order.filled_price,
            order.filled_qty,
            order.leverage,
            None,
            None,
            ts,
        );
        self.open_position_by_key.insert((order.strategy_id.clone(), order.symbol.clone()), position_id.clone());
        self.positions.insert(position_id.clone(), position);
        self.position_out.publish(topic::POSITION_UPDATED, "paper_execution", PositionEvent::Opened { position_id }).await;
    }

    async fn close_position(&self, order: &Order, _ts: Timestamp) {
        let key = (order.strategy_id.clone(), order.symbol.clone());
        if let Some((_, position_id)) = self.open_position_by_key.remove(&key) {
            if let Some((_, position)) = self.positions.remove(&position_id) {
                self.position_out
                    .publish(
                        topic::POSITION_UPDATED,
                        "paper_execution",
                        PositionEvent::Closed { position_id, realized_pnl: position.unrealized_pnl },
                    )
                    .await;
            }
        }
    }

    /// Consumes market events, driving fills and bracket checks, until the subscription is
    /// closed.
    pub async fn run(self: Arc<Self>, input: Subscriber<MarketEvent>) {
        while let Some(delivery) = input.recv().await {
            let envelope = match delivery {
                Delivery::Item(envelope) => envelope,
                Delivery::Gap(gap) => {
                    tracing::warn!(dropped_total = gap.dropped_total, "execution observed a gap on market input");
                    continue;
                }
            };
            if let Some((symbol, ts, mid)) = mid_price_of(&envelope.payload) {
                self.process_price(&symbol, mid, ts).await;
            }
        }
    }
}

#[async_trait]
impl ExecutionClient for PaperExecutionClient {
    async fn submit(&self, order: Order) -> Result<OrderId, ExecutionError> {
        self.validate(&order)?;
        let order_id = order.order_id.clone();
        let symbol = order.symbol.clone();
        self.orders.insert(order_id.clone(), order);
        self.pending_by_symbol.entry(symbol).or_default().push(order_id.clone());
        self.order_out.publish(topic::ORDER_CREATED, "paper_execution", OrderEvent::Created { order_id: order_id.clone() }).await;
        Ok(order_id)
    }

    async fn cancel(&self, order_id: &OrderId) -> Result<(), ExecutionError> {
        let mut entry = self.orders.get_mut(order_id).ok_or_else(|| ExecutionError::UnknownOrder(order_id.clone()))?;
        entry.apply_status(OrderStatus::Cancelled, Timestamp::now())?;
        drop(entry);
        self.order_out.publish(topic::ORDER_CANCELLED, "paper_execution", OrderEvent::Cancelled { order_id: order_id.clone() }).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironflow_bus::bus::EventBus;
    use ironflow_core::{SignalId, StrategyId};

    fn client() -> PaperExecutionClient {
        PaperExecutionClient::new(PaperExecutionConfig::default(), Arc::new(EventBus::default()), Arc::new(EventBus::default()))
    }

    #[tokio::test]
    async fn market_buy_fills_above_mid_on_next_price_update() {
        let client = client();
        let order = Order::new(
            OrderId::new("o1"),
            Some(SignalId::new("sig1")),
            StrategyId::new("s1"),
            Symbol::new("BTCUSDT"),
            OrderSide::Buy,
            OrderType::Market,
            1.0,
            None,
            2.0,
            Timestamp::from_millis(0),
        );
        client.submit(order).await.unwrap();
        client.process_price(&Symbol::new("BTCUSDT"), 100.0, Timestamp::from_millis(1)).await;

        let filled = client.order(&OrderId::new("o1")).unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        assert!(filled.filled_price > 100.0);
        assert_eq!(client.positions.len(), 1);
    }

    #[tokio::test]
    async fn rejects_orders_below_minimum_quantity() {
        let client = client();
        let order = Order::new(
            OrderId::new("o2"),
            None,
            StrategyId::new("s1"),
            Symbol::new("BTCUSDT"),
            OrderSide::Buy,
            OrderType::Market,
            0.00001,
            None,
            1.0,
            Timestamp::from_millis(0),
        );
        assert!(client.submit(order).await.is_err());
    }
}
