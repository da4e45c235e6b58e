//! Timestamp discipline.
//!
//! The original system this engine is modelled on had a confirmed bug where an event's `ts`
//! was sometimes milliseconds and sometimes seconds, which eventually produced a
//! year-2082-in-the-future timestamp once passed to a date-producing call. [`Timestamp`]
//! closes that hole by making the unit part of the type: every component boundary passes a
//! `Timestamp`, never a raw integer, and the only way to build one from an untrusted
//! integer is [`Timestamp::from_epoch_guess`], which rejects magnitudes that don't look
//! like nanoseconds rather than silently reinterpreting them.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Nanoseconds since the Unix epoch. The sole timestamp type crossing component boundaries.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display,
)]
#[display("{_0}ns")]
pub struct Timestamp(i64);

/// Lower bound: 2001-09-09 ~01:46:40 UTC in nanoseconds. Anything below this is almost
/// certainly seconds or milliseconds mistaken for nanoseconds.
const MIN_PLAUSIBLE_NANOS: i64 = 1_000_000_000_000_000_000;

/// Upper bound: year ~2286. Anything above this cannot be a real nanosecond epoch value.
const MAX_PLAUSIBLE_NANOS: i64 = 9_999_999_999_999_999_999i64 / 10;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum TimeError {
    #[error("timestamp {0} is not a plausible nanosecond epoch value (seconds/millis confusion?)")]
    ImplausibleMagnitude(i64),
}

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Build a `Timestamp` from an integer of unknown unit, rejecting values that are not
    /// plausibly already nanoseconds. Use this only at true ingress boundaries where the
    /// unit genuinely cannot be known statically (e.g. a generic numeric field from an
    /// external wire format); everywhere else, prefer `from_nanos`/`from_millis`/`from_secs`.
    pub fn from_epoch_guess(raw: i64) -> Result<Self, TimeError> {
        if (MIN_PLAUSIBLE_NANOS..=MAX_PLAUSIBLE_NANOS).contains(&raw) {
            Ok(Self(raw))
        } else {
            Err(TimeError::ImplausibleMagnitude(raw))
        }
    }

    pub fn now() -> Self {
        let nanos = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(i64::MAX / 2);
        Self(nanos)
    }

    pub const fn as_nanos(&self) -> i64 {
        self.0
    }

    pub const fn as_millis(&self) -> i64 {
        self.0 / 1_000_000
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(
            self.0 / 1_000_000_000,
            (self.0 % 1_000_000_000).unsigned_abs() as u32,
        )
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        i64::try_from(duration.as_nanos())
            .ok()
            .and_then(|d| self.0.checked_add(d))
            .map(Self)
    }

    pub fn saturating_add_millis(&self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis.saturating_mul(1_000_000)))
    }

    pub fn duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        let delta = self.0.checked_sub(earlier.0)?;
        if delta < 0 {
            None
        } else {
            Some(Duration::from_nanos(delta as u64))
        }
    }
}
