#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]

//! # Ironflow Risk
//!
//! The global-limits guard consulted by the Strategy Evaluator (`ironflow-engine`) before
//! any entry order submission: `daily_trades_count < max_daily_trades`, `daily_pnl_pct >
//! -daily_loss_limit_pct`, `concurrent_positions_for_strategy < max_concurrent_positions`,
//! and the strategy's own `max_leverage`. A violation never panics or retries — it produces
//! a typed [`RiskRefused`] reason the caller turns into `entry.conditions_failed`.

pub mod check;

pub use check::RiskCheck;

use check::{
    CheckDailyLossLimit, CheckMaxConcurrentPositions, CheckMaxDailyTrades, CheckMaxLeverage,
    DailyLossLimitExceeded, MaxConcurrentPositionsExceeded, MaxDailyTradesExceeded, MaxLeverageExceeded,
};
use derive_more::{Constructor, Display, From};
use ironflow_strategy::GlobalLimits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wrapper indicating `T` passed every configured risk check.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, Display, From, Constructor)]
pub struct RiskApproved<T>(pub T);

impl<T> RiskApproved<T> {
    pub fn into_item(self) -> T {
        self.0
    }
}

/// Wrapper indicating `T` was rejected, with the specific reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRefused<T, Reason = GlobalLimitsViolation> {
    pub item: T,
    pub reason: Reason,
}

impl<T, Reason> RiskRefused<T, Reason> {
    pub fn new(item: T, reason: Reason) -> Self {
        Self { item, reason }
    }

    pub fn into_item(self) -> T {
        self.item
    }
}

/// Every way the global-limits guard can refuse an entry. Ordered the way `check` tests
/// them (trade count, loss limit, concurrency, leverage), not by severity.
#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum GlobalLimitsViolation {
    #[error(transparent)]
    MaxDailyTrades(#[from] MaxDailyTradesExceeded),
    #[error(transparent)]
    DailyLossLimit(#[from] DailyLossLimitExceeded),
    #[error(transparent)]
    MaxConcurrentPositions(#[from] MaxConcurrentPositionsExceeded),
    #[error(transparent)]
    MaxLeverage(#[from] MaxLeverageExceeded),
}

impl GlobalLimitsViolation {
    /// The stable reason code carried on `entry.conditions_failed`.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MaxDailyTrades(_) => "max_daily_trades",
            Self::DailyLossLimit(_) => "daily_loss_limit",
            Self::MaxConcurrentPositions(_) => "max_concurrent_positions",
            Self::MaxLeverage(_) => "max_leverage",
        }
    }
}

/// The live counters an evaluator must supply to check a candidate entry against a
/// strategy's [`GlobalLimits`]. `concurrent_positions` counts only this strategy's open
/// positions, not a global account-wide count.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlobalLimitsContext {
    pub daily_trades_count: u32,
    pub daily_pnl_pct: f64,
    pub concurrent_positions: u32,
    pub requested_leverage: f64,
}

/// Consults a strategy's [`GlobalLimits`] against a live [`GlobalLimitsContext`], returning
/// the first violation encountered (trade count, then loss limit, then concurrency, then
/// leverage) or approval if none apply.
#[derive(Debug, Copy, Clone)]
pub struct GlobalLimitsGuard<'a> {
    pub limits: &'a GlobalLimits,
}

impl<'a> GlobalLimitsGuard<'a> {
    pub fn new(limits: &'a GlobalLimits) -> Self {
        Self { limits }
    }

    pub fn check<T>(&self, item: T, ctx: &GlobalLimitsContext) -> Result<RiskApproved<T>, RiskRefused<T>> {
        if let Err(e) = (CheckMaxDailyTrades { limit: self.limits.max_daily_trades }).check(&ctx.daily_trades_count) {
            return Err(RiskRefused::new(item, e.into()));
        }
        if let Err(e) =
            (CheckDailyLossLimit { limit_pct: self.limits.daily_loss_limit_pct }).check(&ctx.daily_pnl_pct)
        {
            return Err(RiskRefused::new(item, e.into()));
        }
        if let Err(e) = (CheckMaxConcurrentPositions { limit: self.limits.max_concurrent_positions })
            .check(&ctx.concurrent_positions)
        {
            return Err(RiskRefused::new(item, e.into()));
        }
        if let Err(e) = (CheckMaxLeverage { limit: self.limits.max_leverage }).check(&ctx.requested_leverage) {
            return Err(RiskRefused::new(item, e.into()));
        }
        Ok(RiskApproved::new(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> GlobalLimits {
        GlobalLimits {
            max_daily_trades: 5,
            daily_loss_limit_pct: 3.0,
            max_concurrent_positions: 1,
            cooldown_minutes: 5,
            max_leverage: 5.0,
        }
    }

    fn ok_context() -> GlobalLimitsContext {
        GlobalLimitsContext {
            daily_trades_count: 1,
            daily_pnl_pct: 0.5,
            concurrent_positions: 0,
            requested_leverage: 2.0,
        }
    }

    #[test]
    fn approves_when_every_limit_is_respected() {
        let limits = limits();
        let guard = GlobalLimitsGuard::new(&limits);
        assert!(guard.check("entry", &ok_context()).is_ok());
    }

    #[test]
    fn daily_loss_limit_takes_priority_after_trade_count() {
        let limits = limits();
        let guard = GlobalLimitsGuard::new(&limits);
        let mut ctx = ok_context();
        ctx.daily_pnl_pct = -3.5;
        let refused = guard.check("entry", &ctx).unwrap_err();
        assert_eq!(refused.reason.reason_code(), "daily_loss_limit");
    }

    #[test]
    fn leverage_above_strategy_max_is_refused() {
        let limits = limits();
        let guard = GlobalLimitsGuard::new(&limits);
        let mut ctx = ok_context();
        ctx.requested_leverage = 6.0;
        let refused = guard.check("entry", &ctx).unwrap_err();
        assert_eq!(refused.reason.reason_code(), "max_leverage");
    }
}
