//! Canonical market event types.

use ironflow_core::{Symbol, Timestamp};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar/tick, immutable once produced. Ordered per `symbol` by `ts`;
/// cross-symbol ordering is not required.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol_idx: u32,
    pub ts: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub trades_count: u64,
    pub vwap: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol_idx: u32,
    pub ts: Timestamp,
    pub price: f64,
    pub quantity: f64,
    pub side: TradeSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookLevel {
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub symbol_idx: u32,
    pub ts: Timestamp,
    pub bids: Vec<OrderbookLevel>,
    pub asks: Vec<OrderbookLevel>,
}

impl OrderbookSnapshot {
    pub fn mid(&self) -> Option<f64> {
        let best_bid = self.bids.first()?.price;
        let best_ask = self.asks.first()?.price;
        Some((best_bid + best_ask) / 2.0)
    }
}

/// Sum type carried as `indicator.*`/`market.*` bus payloads. `symbol` is carried alongside
/// the event itself (rather than only the internal `symbol_idx`) so subscribers that only
/// hold the bus envelope can filter without an indirection through the instrument table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    Tick { symbol: Symbol, tick: Tick },
    Trade { symbol: Symbol, trade: Trade },
    Orderbook { symbol: Symbol, snapshot: OrderbookSnapshot },
    Reconnected { symbol: Symbol, gap_from: Timestamp, gap_to: Timestamp },
}

impl MarketEvent {
    pub fn symbol(&self) -> &Symbol {
        match self {
            MarketEvent::Tick { symbol, .. }
            | MarketEvent::Trade { symbol, .. }
            | MarketEvent::Orderbook { symbol, .. }
            | MarketEvent::Reconnected { symbol, .. } => symbol,
        }
    }

    pub fn ts(&self) -> Timestamp {
        match self {
            MarketEvent::Tick { tick, .. } => tick.ts,
            MarketEvent::Trade { trade, .. } => trade.ts,
            MarketEvent::Orderbook { snapshot, .. } => snapshot.ts,
            MarketEvent::Reconnected { gap_to, .. } => *gap_to,
        }
    }
}
