#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Ironflow Session
//!
//! The session controller (C8): orchestrates the two-phase startup that warms the
//! strategy cache before a single evaluator is activated, enforces session-level budget
//! caps and symbol-overlap conflict rules (`live > paper > backtest`), and tracks the
//! degraded-status signal surfaced when activation failures exceed the configured
//! tolerance. Also owns process-wide [`config::Config`] loading.

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod session;

pub use config::Config;
pub use controller::SessionController;
pub use error::SessionError;
pub use event::SessionEvent;
pub use session::{Session, SessionMode, SessionRequest, SessionStatus};
