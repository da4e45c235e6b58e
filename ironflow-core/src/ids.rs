//! Identifier newtypes shared across every Ironflow crate.
//!
//! Keeping these in `ironflow-core` (rather than duplicating them per-crate, the way some
//! frameworks spread `OrderId`/`StrategyId` across their `execution` crate) avoids a
//! dependency cycle between the strategy, engine and execution crates, all of which need to
//! name the same handful of identifiers.

use derive_more::{Constructor, Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

macro_rules! smol_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Hash,
            Deserialize,
            Serialize,
            Display,
            From,
            Constructor,
        )]
        pub struct $name(pub SmolStr);

        impl $name {
            pub fn new(value: impl Into<SmolStr>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(SmolStr::new(value))
            }
        }
    };
}

smol_id!(Symbol, "A traded instrument symbol, e.g. `BTCUSDT`.");
smol_id!(
    StrategyId,
    "Stable identity of a strategy definition, client-supplied name or server-assigned UUID string."
);
smol_id!(
    VariantId,
    "Canonical identity of an indicator computation: base type + ordered params."
);
smol_id!(OrderId, "Identity of an order, stable across its lifecycle.");
smol_id!(PositionId, "Identity of an open or closed position.");
smol_id!(SignalId, "Identity of a single S1-detected signal.");
smol_id!(SessionId, "Identity of a trading session.");

/// Key identifying exactly one runtime `(strategy, symbol)` binding. At most one
/// [`StrategyInstance`](crate) may be `ACTIVE` under a given `InstanceKey` at any time.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Constructor)]
pub struct InstanceKey {
    pub strategy_id: StrategyId,
    pub symbol: Symbol,
}

impl std::fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.strategy_id, self.symbol)
    }
}
