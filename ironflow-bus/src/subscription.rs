//! Per-subscription bounded queue with configurable slow-consumer policy.

use crate::event::{Delivery, Envelope, GapMarker};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::Notify;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(pub u64);

/// Policy applied when a subscription's bounded queue is full at publish time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlowConsumerPolicy {
    /// Evict the oldest queued item to make room for the new one.
    DropOldest,
    /// Drop the incoming item, leaving the queue untouched.
    DropNewest,
    /// Block the publisher for up to the given number of milliseconds waiting for space;
    /// if the deadline passes, falls back to `DropNewest` semantics for that item.
    BlockPublisherUpToMs(u64),
}

struct Inner<T> {
    queue: Mutex<VecDeque<Delivery<T>>>,
    capacity: usize,
    policy: SlowConsumerPolicy,
    pattern: String,
    topic_hint: &'static str,
    data_ready: Notify,
    space_freed: Notify,
    dropped_total: AtomicU64,
    closed: AtomicBool,
    /// Cumulative-drop marker for the next `recv`, set by `push_gap`. A dedicated cell
    /// rather than an entry in `queue`: a `Delivery::Gap` sitting in the bounded queue
    /// could itself be silently evicted by `DropOldest` before ever being delivered,
    /// which would defeat the point of the marker and desync `dropped_total` from the
    /// number of queue slots `DropOldest` actually took from undelivered items.
    pending_gap: Mutex<Option<GapMarker>>,
}

/// Handle returned by [`EventBus::subscribe`](crate::bus::EventBus::subscribe). Cloneable;
/// all clones observe the same queue.
#[derive(Clone)]
pub struct Subscriber<T> {
    pub(crate) id: SubscriptionId,
    inner: Arc<Inner<T>>,
}

impl<T> std::fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id.0)
            .field("pattern", &self.inner.pattern)
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl<T> Subscriber<T> {
    pub(crate) fn new(
        id: SubscriptionId,
        pattern: impl Into<String>,
        topic_hint: &'static str,
        capacity: usize,
        policy: SlowConsumerPolicy,
    ) -> Self {
        Self {
            id,
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
                capacity: capacity.max(1),
                policy,
                pattern: pattern.into(),
                topic_hint,
                data_ready: Notify::new(),
                space_freed: Notify::new(),
                dropped_total: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                pending_gap: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn pattern(&self) -> &str {
        &self.inner.pattern
    }

    pub fn dropped_total(&self) -> u64 {
        self.inner.dropped_total.load(Ordering::SeqCst)
    }

    /// Receive the next delivery. Returns `None` once the subscription has been closed
    /// and fully drained — any event already queued before `close` is still delivered
    /// first. A pending gap marker is delivered only once the item backlog is drained,
    /// so it reads as "you're caught up, but N events never arrived" rather than
    /// interrupting in-order delivery of what's already queued.
    pub async fn recv(&self) -> Option<Delivery<T>> {
        loop {
            {
                let mut queue = self.inner.queue.lock().expect("subscriber queue poisoned");
                if let Some(item) = queue.pop_front() {
                    drop(queue);
                    self.inner.space_freed.notify_waiters();
                    return Some(item);
                }
            }
            if let Some(gap) = self.inner.pending_gap.lock().expect("pending gap poisoned").take() {
                return Some(Delivery::Gap(gap));
            }
            if self.inner.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.inner.data_ready.notified().await;
        }
    }

    /// Stop accepting new publishes. Events already queued are still drained via `recv`.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.data_ready.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Waits until every already-queued event has been drained (via `recv`) or the
    /// subscription is closed with an empty queue. Used by deactivation paths that must
    /// not return until in-flight events are fully handled.
    pub async fn drained(&self) {
        loop {
            {
                let queue = self.inner.queue.lock().expect("subscriber queue poisoned");
                let pending_gap = self.inner.pending_gap.lock().expect("pending gap poisoned");
                if queue.is_empty() && pending_gap.is_none() {
                    return;
                }
            }
            self.inner.space_freed.notified().await;
        }
    }

    /// Attempts to enqueue an event, applying the slow-consumer policy on overflow.
    /// Returns `true` if the event ends up in the queue (and will eventually be
    /// delivered), `false` if it was dropped outright.
    pub(crate) async fn try_enqueue(&self, envelope: Envelope<T>) -> bool
    where
        T: Clone,
    {
        if self.inner.closed.load(Ordering::SeqCst) {
            return false;
        }
        loop {
            {
                let mut queue = self.inner.queue.lock().expect("subscriber queue poisoned");
                if queue.len() < self.inner.capacity {
                    queue.push_back(Delivery::Item(envelope));
                    drop(queue);
                    self.inner.data_ready.notify_waiters();
                    return true;
                }
                match self.inner.policy {
                    SlowConsumerPolicy::DropOldest => {
                        queue.pop_front();
                        self.inner.dropped_total.fetch_add(1, Ordering::SeqCst);
                        queue.push_back(Delivery::Item(envelope));
                        drop(queue);
                        self.push_gap();
                        return true;
                    }
                    SlowConsumerPolicy::DropNewest => {
                        self.inner.dropped_total.fetch_add(1, Ordering::SeqCst);
                        drop(queue);
                        self.push_gap();
                        return false;
                    }
                    SlowConsumerPolicy::BlockPublisherUpToMs(ms) => {
                        drop(queue);
                        let waited =
                            tokio::time::timeout(Duration::from_millis(ms), self.inner.space_freed.notified())
                                .await;
                        if waited.is_err() {
                            self.inner.dropped_total.fetch_add(1, Ordering::SeqCst);
                            self.push_gap();
                            return false;
                        }
                        // retry the loop: space may now be available
                        continue;
                    }
                }
            }
        }
    }

    /// Records that at least one event has been dropped since the last delivered gap
    /// marker, carrying the current cumulative `dropped_total`. Repeated drops before the
    /// subscriber next calls `recv` coalesce into a single marker with the latest count
    /// rather than piling one up per drop.
    pub(crate) fn push_gap(&self) {
        let marker = GapMarker {
            topic: self.inner.topic_hint,
            dropped_total: self.inner.dropped_total.load(Ordering::SeqCst),
        };
        *self.inner.pending_gap.lock().expect("pending gap poisoned") = Some(marker);
        self.inner.data_ready.notify_waiters();
        self.inner.space_freed.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironflow_core::{Sequence, Timestamp};

    fn envelope(topic: &'static str, seq: u64) -> Envelope<u32> {
        Envelope {
            topic,
            ts: Timestamp::now(),
            source: "test",
            seq: Sequence::new(seq),
            payload: seq as u32,
        }
    }

    #[tokio::test]
    async fn drop_oldest_keeps_newest_and_counts_drops() {
        let sub = Subscriber::new(SubscriptionId(1), "t", "t", 2, SlowConsumerPolicy::DropOldest);
        for i in 0..4 {
            sub.try_enqueue(envelope("t", i)).await;
        }
        assert_eq!(sub.dropped_total(), 2);
        let first = sub.recv().await.unwrap().into_item().unwrap();
        assert_eq!(first.payload, 2);
        let second = sub.recv().await.unwrap().into_item().unwrap();
        assert_eq!(second.payload, 3);
        let gap = sub.recv().await.unwrap().into_gap().unwrap();
        assert_eq!(gap.dropped_total, 2);
    }

    #[tokio::test]
    async fn drop_newest_rejects_the_incoming_event() {
        let sub = Subscriber::new(SubscriptionId(1), "t", "t", 1, SlowConsumerPolicy::DropNewest);
        assert!(sub.try_enqueue(envelope("t", 0)).await);
        assert!(!sub.try_enqueue(envelope("t", 1)).await);
        assert_eq!(sub.dropped_total(), 1);
        let first = sub.recv().await.unwrap().into_item().unwrap();
        assert_eq!(first.payload, 0);
        let gap = sub.recv().await.unwrap().into_gap().unwrap();
        assert_eq!(gap.dropped_total, 1);
    }

    #[tokio::test]
    async fn closed_subscription_drains_before_ending() {
        let sub = Subscriber::new(SubscriptionId(1), "t", "t", 4, SlowConsumerPolicy::DropNewest);
        sub.try_enqueue(envelope("t", 0)).await;
        sub.close();
        assert!(!sub.try_enqueue(envelope("t", 1)).await);
        assert!(sub.recv().await.is_some());
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn delivered_count_plus_dropped_total_equals_published() {
        const CAPACITY: usize = 3;
        const PUBLISHED: u64 = 10;
        let sub = Subscriber::new(SubscriptionId(1), "t", "t", CAPACITY, SlowConsumerPolicy::DropOldest);
        for i in 0..PUBLISHED {
            sub.try_enqueue(envelope("t", i)).await;
        }
        // DropOldest never drops a slot that's already been delivered, so after publishing
        // past capacity the queue holds exactly `CAPACITY` items still waiting to be drained.
        let mut delivered = 0u64;
        for _ in 0..CAPACITY {
            if sub.recv().await.and_then(|d| d.into_item()).is_some() {
                delivered += 1;
            }
        }
        assert_eq!(delivered as u64 + sub.dropped_total(), PUBLISHED);
    }
}
