//! Per-subscriber bounded queue with drop-oldest overflow.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::StreamError;
use crate::metrics::RingBuffer;

/// One subscriber's queue. Written by the dispatch loop, read by exactly
/// one [`Subscription`](super::Subscription).
pub(crate) struct SubscriberQueue<T> {
    ring: Mutex<RingBuffer<T>>,
    ready: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
    /// First publish sequence this subscriber is entitled to.
    start_seq: u64,
}

impl<T> SubscriberQueue<T> {
    pub(crate) fn new(capacity: usize, start_seq: u64) -> Result<Self, StreamError> {
        Ok(Self {
            ring: Mutex::new(RingBuffer::new(capacity)?),
            ready: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            start_seq,
        })
    }

    fn ring(&self) -> MutexGuard<'_, RingBuffer<T>> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn start_seq(&self) -> u64 {
        self.start_seq
    }

    /// Insert without blocking, evicting the oldest queued item when full.
    pub(crate) fn push(&self, item: T) {
        if self.is_closed() {
            return;
        }
        let evicted = self.ring().push_and_pop_when_full(item);
        if evicted.is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.ready.notify_one();
    }

    pub(crate) fn pop(&self) -> Option<T> {
        self.ring().pop().ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.ring().len()
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.ready.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Wait until something was pushed or the queue was closed.
    ///
    /// `Notify` keeps one permit, so a push that lands between a failed
    /// `pop` and this call is not missed.
    pub(crate) async fn ready(&self) {
        self.ready.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_drops_oldest_and_counts() {
        let q = SubscriberQueue::new(2, 0).unwrap();
        q.push(1);
        q.push(2);
        q.push(3);
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn closed_queue_ignores_pushes() {
        let q = SubscriberQueue::new(1, 0).unwrap();
        q.close();
        q.push(1);
        assert_eq!(q.len(), 0);
        assert!(q.is_closed());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(SubscriberQueue::<u8>::new(0, 0).is_err());
    }
}
