#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::type_complexity)]

//! # Ironflow Strategy
//!
//! The strategy definition data model (five fixed sections: S1 signal, O1 cancel, Z1
//! entry, ZE1 close, emergency exit) and its schema-validated durable store. This crate
//! owns *definitions* only; runtime activation and evaluation live in `ironflow-engine`,
//! which reads through [`store::StrategyStore`].

pub mod condition;
pub mod error;
pub mod store;
pub mod strategy;
pub mod validation;

pub use condition::{ComparisonTarget, Condition, ConditionState, Operator};
pub use error::{SectionError, StoreError, StrategyValidationError};
pub use store::{InMemoryStrategyStore, StrategyFilter, StrategyStore};
pub use strategy::{
    Direction, EmergencyExit, GlobalLimits, O1Cancel, PositionSize, S1Signal, StopLoss, Strategy, TakeProfit,
    Ze1Close, Z1Entry,
};
