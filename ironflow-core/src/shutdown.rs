//! Graceful shutdown traits and the `Shutdown` bus signal.

use serde::{Deserialize, Serialize};
use std::future::Future;

/// Components that can shut down immediately, without any async operation.
pub trait SyncShutdown {
    type Result;
    fn shutdown(&mut self) -> Self::Result;
}

/// Components that must perform async work (draining a channel, flushing a writer) during
/// shutdown.
pub trait AsyncShutdown {
    type Result;
    fn shutdown(&mut self) -> impl Future<Output = Self::Result>;
}

/// Signal published on the bus (or passed directly) to request a graceful system-wide
/// shutdown.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize, Serialize,
)]
pub struct Shutdown;
