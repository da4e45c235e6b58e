//! Position tracking and the liquidation price invariant.

use ironflow_core::{PositionId, StrategyId, Symbol, Timestamp};
use ironflow_strategy::Direction;
use serde::{Deserialize, Serialize};

/// `liquidation_price(LONG, p, L) = p * (1 - 1/L)`, `liquidation_price(SHORT, p, L) = p * (1 +
/// 1/L)`. At `leverage == 1` a long's liquidation price is `0` (the formula already gives
/// this); a short's is defined as `+inf` since the formula's finite value at `L=1` would be
/// misleading — there is no liquidation risk at 1x.
pub fn liquidation_price(side: Direction, entry_price: f64, leverage: f64) -> f64 {
    if leverage <= 1.0 {
        return match side {
            Direction::Long => 0.0,
            Direction::Short => f64::INFINITY,
        };
    }
    match side {
        Direction::Long => entry_price * (1.0 - 1.0 / leverage),
        Direction::Short => entry_price * (1.0 + 1.0 / leverage),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: PositionId,
    pub strategy_id: StrategyId,
    pub symbol: Symbol,
    pub side: Direction,
    pub entry_price: f64,
    pub qty: f64,
    pub leverage: f64,
    pub sl_price: Option<f64>,
    pub tp_price: Option<f64>,
    pub ts_opened: Timestamp,
    pub unrealized_pnl: f64,
    pub realized_pnl: f64,
    pub liquidation_price: f64,
}

impl Position {
    pub fn open(
        position_id: PositionId,
        strategy_id: StrategyId,
        symbol: Symbol,
        side: Direction,
        entry_price: f64,
        qty: f64,
        leverage: f64,
        sl_price: Option<f64>,
        tp_price: Option<f64>,
        ts_opened: Timestamp,
    ) -> Self {
        let liquidation_price = liquidation_price(side, entry_price, leverage);
        Self {
            position_id,
            strategy_id,
            symbol,
            side,
            entry_price,
            qty,
            leverage,
            sl_price,
            tp_price,
            ts_opened,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            liquidation_price,
        }
    }

    /// Marks the position to `price`, updating `unrealized_pnl` in place.
    pub fn mark(&mut self, price: f64) {
        let direction = match self.side {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        };
        self.unrealized_pnl = direction * (price - self.entry_price) * self.qty;
    }

    /// Whether `price` has crossed the stop-loss or take-profit bracket, if armed.
    pub fn bracket_triggered(&self, price: f64) -> Option<BracketTrigger> {
        match self.side {
            Direction::Long => {
                if let Some(sl) = self.sl_price {
                    if price <= sl {
                        return Some(BracketTrigger::StopLoss);
                    }
                }
                if let Some(tp) = self.tp_price {
                    if price >= tp {
                        return Some(BracketTrigger::TakeProfit);
                    }
                }
            }
            Direction::Short => {
                if let Some(sl) = self.sl_price {
                    if price >= sl {
                        return Some(BracketTrigger::StopLoss);
                    }
                }
                if let Some(tp) = self.tp_price {
                    if price <= tp {
                        return Some(BracketTrigger::TakeProfit);
                    }
                }
            }
        }
        None
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BracketTrigger {
    StopLoss,
    TakeProfit,
}

/// Bus payload for position lifecycle notifications, coalesced at a configurable minimum
/// interval upstream rather than on every single mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PositionEvent {
    Opened { position_id: PositionId },
    Updated { position_id: PositionId, unrealized_pnl: f64 },
    Closed { position_id: PositionId, realized_pnl: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn liquidation_price_matches_the_published_test_vectors() {
        assert_relative_eq!(liquidation_price(Direction::Long, 50_000.0, 1.0), 0.0);
        assert_relative_eq!(liquidation_price(Direction::Long, 50_000.0, 3.0), 33_333.33, epsilon = 0.01);
        assert_relative_eq!(liquidation_price(Direction::Short, 50_000.0, 3.0), 66_666.67, epsilon = 0.01);
        assert_relative_eq!(liquidation_price(Direction::Short, 50_000.0, 10.0), 55_000.0, epsilon = 0.01);
        assert!(liquidation_price(Direction::Short, 50_000.0, 1.0).is_infinite());
    }

    #[test]
    fn long_bracket_triggers_on_sl_or_tp_crossing() {
        let mut p = Position::open(
            PositionId::new("p1"),
            StrategyId::new("s1"),
            Symbol::new("BTCUSDT"),
            Direction::Long,
            100.0,
            1.0,
            2.0,
            Some(95.0),
            Some(110.0),
            Timestamp::from_millis(0),
        );
        assert_eq!(p.bracket_triggered(94.0), Some(BracketTrigger::StopLoss));
        assert_eq!(p.bracket_triggered(111.0), Some(BracketTrigger::TakeProfit));
        assert_eq!(p.bracket_triggered(100.0), None);
        p.mark(120.0);
        assert!(p.unrealized_pnl > 0.0);
    }

    #[test]
    fn leverage_of_one_still_arms_the_bracket_with_no_liquidation_price() {
        let mut p = Position::open(
            PositionId::new("p2"),
            StrategyId::new("s1"),
            Symbol::new("BTCUSDT"),
            Direction::Long,
            100.0,
            1.0,
            1.0,
            Some(95.0),
            Some(110.0),
            Timestamp::from_millis(0),
        );
        assert_eq!(p.liquidation_price, 0.0);
        assert_eq!(p.bracket_triggered(94.0), Some(BracketTrigger::StopLoss));
        assert_eq!(p.bracket_triggered(111.0), Some(BracketTrigger::TakeProfit));
        p.mark(105.0);
        assert!(p.unrealized_pnl > 0.0);
    }

    #[test]
    fn unrealized_pnl_stays_within_the_sanity_bound_across_a_mark_series() {
        let mut p = Position::open(
            PositionId::new("p3"),
            StrategyId::new("s1"),
            Symbol::new("BTCUSDT"),
            Direction::Short,
            50_000.0,
            2.0,
            5.0,
            None,
            None,
            Timestamp::from_millis(0),
        );
        for price in [45_000.0, 40_000.0, 60_000.0, 50_000.0, 10_000.0] {
            p.mark(price);
            let bound = p.qty * p.entry_price.max(price) * p.leverage * 1.0001;
            assert!(
                p.unrealized_pnl.abs() <= bound,
                "unrealized_pnl {} exceeded bound {} at mark price {}",
                p.unrealized_pnl,
                bound,
                price
            );
        }
    }

    proptest! {
        /// `liquidation_price` is derived from `margin = notional / leverage`; marking a
        /// position at its own liquidation price must lose exactly that margin, for any
        /// entry price, leverage above 1x, and side.
        #[test]
        fn marking_at_the_liquidation_price_always_loses_exactly_the_initial_margin(
            entry_price in 1.0f64..200_000.0,
            leverage in 1.01f64..50.0,
            qty in 0.0001f64..100.0,
            long in any::<bool>(),
        ) {
            let side = if long { Direction::Long } else { Direction::Short };
            let liq = liquidation_price(side, entry_price, leverage);
            let mut p = Position::open(
                PositionId::new("p"),
                StrategyId::new("s"),
                Symbol::new("SYM"),
                side,
                entry_price,
                qty,
                leverage,
                None,
                None,
                Timestamp::from_millis(0),
            );
            p.mark(liq);
            let margin = entry_price * qty / leverage;
            prop_assert!((p.unrealized_pnl + margin).abs() < margin.max(1.0) * 1e-6);
        }

        /// A long's liquidation price never sits above entry (it can only be breached by
        /// price falling); a short's never sits below entry. At `leverage == 1` liquidation
        /// is unreachable in either direction.
        #[test]
        fn liquidation_price_sits_on_the_losing_side_of_entry(
            entry_price in 1.0f64..200_000.0,
            leverage in 1.0f64..50.0,
        ) {
            let long_liq = liquidation_price(Direction::Long, entry_price, leverage);
            let short_liq = liquidation_price(Direction::Short, entry_price, leverage);
            prop_assert!(long_liq <= entry_price);
            prop_assert!(short_liq >= entry_price);
        }
    }
}
