//! Individual named risk checks, composed by [`crate::GlobalLimitsGuard`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// General interface for a single risk validation: given an `Input`, either pass or
/// produce a typed `Error` describing exactly which limit was exceeded.
pub trait RiskCheck {
    type Input;
    type Error;

    fn name() -> &'static str;
    fn check(&self, input: &Self::Input) -> Result<(), Self::Error>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
#[error("daily trade count {count} has reached the limit of {limit}")]
pub struct MaxDailyTradesExceeded {
    pub count: u32,
    pub limit: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Error)]
#[error("daily pnl {pnl_pct}% has breached the loss limit of -{limit_pct}%")]
pub struct DailyLossLimitExceeded {
    pub pnl_pct: f64,
    pub limit_pct: f64,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
#[error("concurrent positions {count} has reached the limit of {limit}")]
pub struct MaxConcurrentPositionsExceeded {
    pub count: u32,
    pub limit: u32,
}

#[derive(Debug, Copy, Clone, PartialEq, Error)]
#[error("leverage {leverage}x exceeds the strategy's max_leverage {limit}x")]
pub struct MaxLeverageExceeded {
    pub leverage: f64,
    pub limit: f64,
}

/// Validates `daily_trades_count < max_daily_trades`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CheckMaxDailyTrades {
    pub limit: u32,
}

impl RiskCheck for CheckMaxDailyTrades {
    type Input = u32;
    type Error = MaxDailyTradesExceeded;

    fn name() -> &'static str {
        "max_daily_trades"
    }

    fn check(&self, count: &u32) -> Result<(), Self::Error> {
        if *count >= self.limit {
            Err(MaxDailyTradesExceeded { count: *count, limit: self.limit })
        } else {
            Ok(())
        }
    }
}

/// Validates `daily_pnl_pct > -daily_loss_limit_pct`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckDailyLossLimit {
    pub limit_pct: f64,
}

impl RiskCheck for CheckDailyLossLimit {
    type Input = f64;
    type Error = DailyLossLimitExceeded;

    fn name() -> &'static str {
        "daily_loss_limit"
    }

    fn check(&self, pnl_pct: &f64) -> Result<(), Self::Error> {
        if *pnl_pct <= -self.limit_pct {
            Err(DailyLossLimitExceeded { pnl_pct: *pnl_pct, limit_pct: self.limit_pct })
        } else {
            Ok(())
        }
    }
}

/// Validates `concurrent_positions_for_strategy < max_concurrent_positions`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CheckMaxConcurrentPositions {
    pub limit: u32,
}

impl RiskCheck for CheckMaxConcurrentPositions {
    type Input = u32;
    type Error = MaxConcurrentPositionsExceeded;

    fn name() -> &'static str {
        "max_concurrent_positions"
    }

    fn check(&self, count: &u32) -> Result<(), Self::Error> {
        if *count >= self.limit {
            Err(MaxConcurrentPositionsExceeded { count: *count, limit: self.limit })
        } else {
            Ok(())
        }
    }
}

/// Validates the strategy's chosen leverage against its own `max_leverage` limit (distinct
/// from the schema-level `[1, 10]` bound already enforced at strategy-store write time).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckMaxLeverage {
    pub limit: f64,
}

impl RiskCheck for CheckMaxLeverage {
    type Input = f64;
    type Error = MaxLeverageExceeded;

    fn name() -> &'static str {
        "max_leverage"
    }

    fn check(&self, leverage: &f64) -> Result<(), Self::Error> {
        if *leverage > self.limit {
            Err(MaxLeverageExceeded { leverage: *leverage, limit: self.limit })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_loss_limit_rejects_at_exactly_the_boundary() {
        let check = CheckDailyLossLimit { limit_pct: 3.0 };
        assert!(check.check(&-3.0).is_err());
        assert!(check.check(&-2.999).is_ok());
    }

    #[test]
    fn max_daily_trades_rejects_at_the_limit_not_just_above() {
        let check = CheckMaxDailyTrades { limit: 10 };
        assert!(check.check(&9).is_ok());
        assert!(check.check(&10).is_err());
    }
}
