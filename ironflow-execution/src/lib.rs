#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Ironflow Execution
//!
//! Paper/live order lifecycle, position tracking and SL/TP bracket arming. A concrete live
//! venue adapter lives outside this workspace, the same boundary the market data gateway
//! draws around exchange connectivity — [`client::ExecutionClient`] is the seam.

pub mod client;
pub mod error;
pub mod order;
pub mod position;

pub use client::{ExecutionClient, PaperExecutionClient, PaperExecutionConfig};
pub use error::ExecutionError;
pub use order::{Order, OrderEvent, OrderSide, OrderStatus, OrderType};
pub use position::{liquidation_price, BracketTrigger, Position, PositionEvent};
