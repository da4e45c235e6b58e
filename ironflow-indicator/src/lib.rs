#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::type_complexity)]

//! # Ironflow Indicator
//!
//! Computes variant-parameterized technical indicators incrementally over per-symbol
//! sliding windows, replacing a class-per-algorithm-plus-instance-duplicates design with a
//! [`catalog::VariantCatalog`] mapping `variant_id -> (factory, output_shape)`. A second
//! registration under the same `variant_id` is a hard error, never a silent overwrite.
//!
//! The engine is sharded per symbol ([`engine::IndicatorEngine`]) so unrelated symbols
//! never contend on the same lock; within a shard, indicators update synchronously as
//! ticks arrive. All accumulators use `f64`; a `NaN`/`Inf` result is suppressed to
//! "no value" and increments a per-variant error counter rather than propagating.

pub mod builtin;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod tail_cache;
pub mod value;
pub mod variant;
pub mod window;

pub use catalog::{CatalogError, Indicator, IndicatorFactory, VariantCatalog};
pub use engine::IndicatorEngine;
pub use error::IndicatorError;
pub use value::{IndicatorOutput, IndicatorValue};
pub use variant::{IndicatorVariant, VariantParams};
