//! Per-symbol monotonic timestamp enforcement.
//!
//! Guarantees that the stream of ticks handed to the indicator engine for a given symbol
//! is strictly increasing in `ts`: exact duplicates are dropped silently (already seen),
//! and arrivals that land more than `tolerance` behind the last-seen `ts` are dropped and
//! counted as out-of-order rather than ever being delivered downstream.

use dashmap::DashMap;
use ironflow_core::{Symbol, Timestamp};
use std::time::Duration;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SequenceOutcome {
    Accept,
    DuplicateDropped,
    StaleDropped,
}

#[derive(Debug)]
struct SymbolState {
    last_ts: Timestamp,
}

/// Tracks the last-seen `ts` per symbol and classifies each new observation.
#[derive(Debug)]
pub struct Sequencer {
    tolerance: Duration,
    last_seen: DashMap<Symbol, SymbolState>,
    stale_dropped_total: std::sync::atomic::AtomicU64,
    duplicate_dropped_total: std::sync::atomic::AtomicU64,
}

impl Sequencer {
    pub fn new(tolerance: Duration) -> Self {
        Self {
            tolerance,
            last_seen: DashMap::new(),
            stale_dropped_total: std::sync::atomic::AtomicU64::new(0),
            duplicate_dropped_total: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Default 500ms out-of-order tolerance.
    pub fn with_default_tolerance() -> Self {
        Self::new(Duration::from_millis(500))
    }

    pub fn observe(&self, symbol: &Symbol, ts: Timestamp) -> SequenceOutcome {
        use std::sync::atomic::Ordering;

        match self.last_seen.get(symbol) {
            None => {
                self.last_seen.insert(symbol.clone(), SymbolState { last_ts: ts });
                SequenceOutcome::Accept
            }
            Some(state) if ts == state.last_ts => {
                self.duplicate_dropped_total.fetch_add(1, Ordering::SeqCst);
                SequenceOutcome::DuplicateDropped
            }
            Some(state) if ts > state.last_ts => {
                drop(state);
                self.last_seen.insert(symbol.clone(), SymbolState { last_ts: ts });
                SequenceOutcome::Accept
            }
            Some(_) => {
                // Behind the watermark: can never be forwarded without breaking the
                // per-symbol monotonic guarantee, regardless of how far behind it is.
                // `tolerance` only distinguishes logging severity upstream, not whether
                // the arrival is accepted.
                self.stale_dropped_total.fetch_add(1, Ordering::SeqCst);
                SequenceOutcome::StaleDropped
            }
        }
    }

    pub fn stale_dropped_total(&self) -> u64 {
        self.stale_dropped_total.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn duplicate_dropped_total(&self) -> u64 {
        self.duplicate_dropped_total.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn last_ts(&self, symbol: &Symbol) -> Option<Timestamp> {
        self.last_seen.get(symbol).map(|s| s.last_ts)
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironflow_core::Symbol;

    fn sym() -> Symbol {
        Symbol::from("BTCUSDT")
    }

    #[test]
    fn first_observation_always_accepted() {
        let seq = Sequencer::with_default_tolerance();
        assert_eq!(seq.observe(&sym(), Timestamp::from_secs(1)), SequenceOutcome::Accept);
    }

    #[test]
    fn duplicate_ts_is_dropped() {
        let seq = Sequencer::with_default_tolerance();
        let ts = Timestamp::from_secs(1);
        seq.observe(&sym(), ts);
        assert_eq!(seq.observe(&sym(), ts), SequenceOutcome::DuplicateDropped);
    }

    #[test]
    fn far_behind_last_seen_is_stale() {
        let seq = Sequencer::with_default_tolerance();
        seq.observe(&sym(), Timestamp::from_secs(10));
        let outcome = seq.observe(&sym(), Timestamp::from_secs(1));
        assert_eq!(outcome, SequenceOutcome::StaleDropped);
        assert_eq!(seq.stale_dropped_total(), 1);
    }

    #[test]
    fn monotonic_increase_always_accepted() {
        let seq = Sequencer::with_default_tolerance();
        for i in 0..100 {
            assert_eq!(
                seq.observe(&sym(), Timestamp::from_millis(i * 10)),
                SequenceOutcome::Accept
            );
        }
    }
}
