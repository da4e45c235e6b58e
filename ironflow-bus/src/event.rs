//! Bus envelope and gap marker.

use ironflow_core::{Sequence, Timestamp};
use serde::{Deserialize, Serialize};

/// Every event published to the bus is wrapped in an `Envelope` carrying
/// `{topic, ts, source, payload}`, plus a bus-assigned [`Sequence`] used to order events of
/// the same topic published at the same `ts` by different publishers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub topic: &'static str,
    pub ts: Timestamp,
    pub source: &'static str,
    pub seq: Sequence,
    pub payload: T,
}

/// A bus event indicating lost events on a subscription. Carries an ever-increasing
/// drop counter scoped to that subscription, so a subscriber can detect loss without the
/// bus needing to know anything about the dropped payload's type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapMarker {
    pub topic: &'static str,
    pub dropped_total: u64,
}

/// What a subscriber actually receives: either a fully delivered event, or notice that
/// some number of events were dropped before this one due to backpressure.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery<T> {
    Item(Envelope<T>),
    Gap(GapMarker),
}

impl<T> Delivery<T> {
    pub fn into_item(self) -> Option<Envelope<T>> {
        match self {
            Delivery::Item(envelope) => Some(envelope),
            Delivery::Gap(_) => None,
        }
    }

    pub fn into_gap(self) -> Option<GapMarker> {
        match self {
            Delivery::Gap(marker) => Some(marker),
            Delivery::Item(_) => None,
        }
    }
}
