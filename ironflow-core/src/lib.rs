#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Ironflow Core
//!
//! Foundational types shared by every other crate in the Ironflow strategy evaluation and
//! execution engine: the [`time::Timestamp`] newtype that enforces a single time unit across
//! all component boundaries, the common identifier newtypes, the top-level error taxonomy,
//! the [`Repository`](repository::Repository) persistence abstraction, logging
//! initialisers, and graceful shutdown traits.
//!
//! Nothing in this crate talks to a network, a database, or an exchange — it only defines
//! the vocabulary that the rest of the workspace shares, the way a framework's `core` crate
//! usually does.

/// Monotonic-nanosecond timestamp discipline. See [`time::Timestamp`].
pub mod time;

/// Identifier newtypes shared across components (`Symbol`, `StrategyId`, `VariantId`, ...).
pub mod ids;

/// Top-level error taxonomy aggregating subsystem errors.
pub mod error;

/// Abstract, out-of-scope persistence sink that every component writes through.
pub mod repository;

/// Tracing-based logging initialisers.
pub mod logging;

/// Graceful shutdown traits and the `Shutdown` signal type.
pub mod shutdown;

pub use error::IronflowError;
pub use ids::{InstanceKey, OrderId, PositionId, SessionId, SignalId, StrategyId, Symbol, VariantId};
pub use time::Timestamp;

/// Monotonically increasing sequence number, used to order events within a single process
/// independently of wall-clock timestamps (useful when two events share a `Timestamp`).
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, serde::Deserialize, serde::Serialize,
)]
pub struct Sequence(pub u64);

impl Sequence {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn fetch_add(&mut self) -> Sequence {
        let current = *self;
        self.0 += 1;
        current
    }
}
