//! Canonical topic strings for the event surface.
//!
//! Topics are `&'static str` rather than an enum: new topics (e.g. a strategy-specific
//! diagnostic) can be published without a workspace-wide enum change, and prefix-wildcard
//! subscriptions (`market.*`) are naturally string operations.

pub const MARKET_PRICE_UPDATE: &str = "market.price_update";
pub const MARKET_TRADE: &str = "market.trade";
pub const MARKET_ORDERBOOK_SNAPSHOT: &str = "market.orderbook_snapshot";
pub const MARKET_RECONNECTED: &str = "market.reconnected";

pub const INDICATOR_UPDATED: &str = "indicator.updated";

pub const SIGNAL_DETECTED: &str = "signal.detected";
pub const SIGNAL_CANCELLED: &str = "signal.cancelled";

pub const ENTRY_SUBMITTED: &str = "entry.submitted";
pub const ENTRY_CONDITIONS_FAILED: &str = "entry.conditions_failed";

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_PARTIAL: &str = "order.partial";
pub const ORDER_FILLED: &str = "order.filled";
pub const ORDER_CANCELLED: &str = "order.cancelled";
pub const ORDER_REJECTED: &str = "order.rejected";
pub const ORDER_FAILED: &str = "order.failed";
pub const ORDER_EXPIRED: &str = "order.expired";

pub const POSITION_UPDATED: &str = "position.updated";
pub const POSITION_CLOSED: &str = "position.closed";

pub const RISK_REFUSED: &str = "risk.refused";

pub const STATE_MACHINE_TRANSITION: &str = "state_machine.transition";

pub const SESSION_STARTED: &str = "session.started";
pub const SESSION_STOPPED: &str = "session.stopped";
pub const SESSION_DEGRADED: &str = "session.degraded";

pub const SYSTEM_ERROR: &str = "system.error";
pub const SYSTEM_GAP: &str = "system.gap";

/// Returns `true` if `topic` is matched by `pattern`. Patterns are either an exact topic,
/// the catch-all `*`, or a prefix wildcard of the form `domain.*`.
pub fn matches(pattern: &str, topic: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix(".*") {
        Some(prefix) => {
            topic.len() > prefix.len()
                && topic.starts_with(prefix)
                && topic.as_bytes()[prefix.len()] == b'.'
        }
        None => pattern == topic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        assert!(matches(MARKET_PRICE_UPDATE, MARKET_PRICE_UPDATE));
        assert!(!matches(MARKET_PRICE_UPDATE, MARKET_TRADE));
    }

    #[test]
    fn prefix_wildcard_matches_whole_domain() {
        assert!(matches("market.*", MARKET_PRICE_UPDATE));
        assert!(matches("market.*", MARKET_TRADE));
        assert!(!matches("market.*", INDICATOR_UPDATED));
        assert!(!matches("market.*", "marketplace.trade"));
    }

    #[test]
    fn catch_all_matches_everything() {
        assert!(matches("*", ORDER_FILLED));
    }
}
