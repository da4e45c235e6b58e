#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_extern_crates,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Ironflow Bus
//!
//! Typed, topic-addressed pub/sub with strict per-`(topic, publisher)` FIFO ordering and
//! per-subscription bounded backpressure. This is the glue between the market data
//! gateway, the indicator engine, the strategy evaluators and the order manager: each has
//! very different latency tolerances, so a single queueing policy for the whole bus would
//! either stall ingestion (if conservative) or silently lose order events (if not). Policy
//! is configured per subscription instead.
//!
//! Topics follow the `domain.action` convention (`market.price_update`,
//! `indicator.updated`, `order.filled`, ...); see [`topic`] for the full event surface.
//! Subscriptions may use a prefix wildcard (`market.*`).

/// Canonical topic name constants for the event surface.
pub mod topic;

/// The envelope every published event is wrapped in, plus the gap marker delivered to
/// subscribers on backpressure loss.
pub mod event;

/// Per-subscription bounded queue, slow-consumer policy, and the subscriber handle.
pub mod subscription;

/// The [`EventBus`] itself: topic registry, publish/subscribe, ordering and deadlines.
pub mod bus;

pub use bus::EventBus;
pub use event::{Delivery, Envelope, GapMarker};
pub use subscription::{SlowConsumerPolicy, Subscriber, SubscriptionId};
