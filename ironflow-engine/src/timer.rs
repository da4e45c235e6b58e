//! Deadline wakeups for O1 timeout and duration-predicate re-checks.
//!
//! No separate tick loop is built here: tokio's own runtime already maintains a hashed
//! timing wheel internally, so racing `tokio::time::sleep` against a subscription's `recv`
//! in `select!` gets the "tick-less deadline source" property for free, one sleep per
//! evaluator rather than a second hand-rolled wheel.

use std::time::Duration;

/// A future that resolves once `remaining` elapses, or immediately if `remaining` is zero
/// or the deadline has already passed.
pub fn sleep_for(remaining: Duration) -> tokio::time::Sleep {
    tokio::time::sleep(remaining)
}

/// The remaining duration until `entered_at + timeout`, measured against `now`. Returns
/// `Duration::ZERO` if the deadline has already elapsed.
pub fn remaining_until(entered_at: ironflow_core::Timestamp, timeout: Duration, now: ironflow_core::Timestamp) -> Duration {
    let elapsed = now.duration_since(entered_at).unwrap_or(Duration::ZERO);
    timeout.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironflow_core::Timestamp;

    #[test]
    fn remaining_until_saturates_at_zero_once_elapsed() {
        let entered = Timestamp::from_millis(0);
        let now = Timestamp::from_millis(5_000);
        assert_eq!(remaining_until(entered, Duration::from_secs(3), now), Duration::ZERO);
        assert_eq!(remaining_until(entered, Duration::from_secs(10), now), Duration::from_secs(5));
    }
}
