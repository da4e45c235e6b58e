#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::type_complexity)]

//! # Ironflow Market
//!
//! Normalises raw venue messages into canonical [`event::Tick`], [`event::Trade`] and
//! [`event::OrderbookSnapshot`] events with a per-symbol monotonic timestamp guarantee:
//! duplicate timestamps are deduplicated, and arrivals older than the last-seen tick by
//! more than a configurable tolerance are dropped and counted rather than propagated
//! out of order. Venue connectivity is abstracted behind [`gateway::GatewayConnection`] so
//! this crate never talks to a real exchange; a concrete adapter lives outside this
//! workspace's scope, with exchange connectors treated as plug-in clients of a generic
//! streaming core.

pub mod error;
pub mod event;
pub mod gateway;
pub mod sequencer;

pub use error::MarketDataError;
pub use event::{MarketEvent, OrderbookSnapshot, Tick, Trade};
pub use sequencer::{SequenceOutcome, Sequencer};
