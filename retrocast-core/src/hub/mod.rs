//! Single-producer, multi-subscriber fan-out with drop-oldest queues.
//!
//! ```text
//!  publish() ──► ingress ring ──► dispatch task ──┬──► queue #1 ──► Subscription
//!  (never blocks)  (drop-oldest)                  ├──► queue #2 ──► Subscription
//!                                                 └──► queue #n ──► Subscription
//! ```
//!
//! Every overflow is resolved by discarding the oldest item, so neither
//! the producer nor any other subscriber ever waits on a slow one.
//! Items are tagged with a publish sequence number; a subscriber only
//! receives items published after it subscribed, even if older items are
//! still sitting in ingress when it registers.

mod queue;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::StreamError;
use crate::metrics::RingBuffer;

use queue::SubscriberQueue;

/// Opaque subscriber handle.
pub type SubscriberId = u64;

// ── Hub ──────────────────────────────────────────────────────────

/// Cheaply cloneable handle to one broadcast hub.
pub struct Hub<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Ingress<T> {
    ring: RingBuffer<(u64, T)>,
    next_seq: u64,
}

struct Shared<T> {
    ingress: Mutex<Ingress<T>>,
    ingress_ready: Notify,
    registry: RwLock<HashMap<SubscriberId, Arc<SubscriberQueue<T>>>>,
    next_id: AtomicU64,
    dispatched: AtomicU64,
    dropped: AtomicU64,
}

impl<T> Shared<T> {
    fn ingress(&self) -> MutexGuard<'_, Ingress<T>> {
        self.ingress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Vec<Arc<SubscriberQueue<T>>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn remove(&self, id: SubscriberId) -> Option<Arc<SubscriberQueue<T>>> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    fn close_all(&self) {
        let drained: Vec<_> = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, q) in drained {
            q.close();
        }
    }
}

impl<T> Hub<T>
where
    T: Clone + Send + 'static,
{
    /// Create a hub whose ingress holds at most `ingress_capacity` items.
    pub fn new(ingress_capacity: usize) -> Result<Self, StreamError> {
        Ok(Self {
            shared: Arc::new(Shared {
                ingress: Mutex::new(Ingress {
                    ring: RingBuffer::new(ingress_capacity)?,
                    next_seq: 0,
                }),
                ingress_ready: Notify::new(),
                registry: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                dispatched: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        })
    }

    /// Start the dispatch loop. It runs until `cancel` fires, then closes
    /// every subscription so pending `recv` calls return `None`.
    pub fn spawn_dispatch(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            dispatch_loop(&shared, &cancel).await;
            shared.close_all();
            debug!("hub dispatch stopped");
        })
    }

    /// Hand an item to the hub. Never blocks and never fails; if ingress is
    /// full its oldest item is discarded.
    pub fn publish(&self, item: T) {
        {
            let mut ingress = self.shared.ingress();
            let seq = ingress.next_seq;
            ingress.next_seq += 1;
            if ingress.ring.push_and_pop_when_full((seq, item)).is_some() {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.shared.ingress_ready.notify_one();
    }

    /// Register a queue of `capacity` items.
    pub fn subscribe(&self, capacity: usize) -> Result<Subscription<T>, StreamError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);

        // Reading next_seq and inserting under the ingress lock orders this
        // registration against concurrent publishes.
        let queue = {
            let ingress = self.shared.ingress();
            let queue = Arc::new(SubscriberQueue::new(capacity, ingress.next_seq)?);
            self.shared
                .registry
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id, Arc::clone(&queue));
            queue
        };

        debug!(id, capacity, "subscriber registered");
        Ok(Subscription {
            id,
            queue,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Deregister `id`; its subscription sees end-of-stream once drained.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if let Some(queue) = self.shared.remove(id) {
            queue.close();
            debug!(id, "subscriber removed");
        }
    }
}

impl<T> Hub<T> {
    pub fn subscriber_count(&self) -> usize {
        self.shared
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Items taken out of ingress and offered to subscribers.
    pub fn dispatched(&self) -> u64 {
        self.shared.dispatched.load(Ordering::Relaxed)
    }

    /// Items discarded because ingress was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

async fn dispatch_loop<T: Clone>(shared: &Shared<T>, cancel: &CancellationToken) {
    loop {
        let next = shared.ingress().ring.pop().ok();
        let Some((seq, item)) = next else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = shared.ingress_ready.notified() => {}
            }
            continue;
        };

        let subscribers = shared.snapshot();
        trace!(seq, subscribers = subscribers.len(), "dispatching");
        for queue in &subscribers {
            if seq >= queue.start_seq() {
                queue.push(item.clone());
            }
        }
        shared.dispatched.fetch_add(1, Ordering::Relaxed);

        if cancel.is_cancelled() {
            return;
        }
    }
}

// ── Subscription ─────────────────────────────────────────────────

/// Receiving end of one subscriber queue. Dropping it deregisters.
pub struct Subscription<T> {
    id: SubscriberId,
    queue: Arc<SubscriberQueue<T>>,
    shared: Arc<Shared<T>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next item, waiting if the queue is empty. `None` once the
    /// subscription was closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.queue.pop() {
                return Some(item);
            }
            if self.queue.is_closed() {
                return None;
            }
            self.queue.ready().await;
        }
    }

    /// Next item if one is queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.queue.pop()
    }

    /// Items this subscriber lost to overflow.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if self.shared.remove(self.id).is_some() {
            debug!(id = self.id, "subscriber dropped");
        }
        self.queue.close();
    }
}

// ── Tests ────────────────────────────────────────────────────────
