//! Broadcast bus
//!
//! The bus owns the live set of subscriber queues and fans every published
//! message out to each of them.
//!
//! Concurrency notes:
//! - The live set sits behind a `std::sync::Mutex`. `register`, `unregister`,
//!   `publish` and `clear` all take it, so they serialize with each other.
//! - `publish` only performs `try_send` into bounded in-memory queues while
//!   holding the lock. Network writes happen later in each session's own task.
//! - A full queue drops the message for that subscriber only; the publisher
//!   and every other subscriber carry on unaffected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::client::{Delivery, Subscriber, SubscriberId};

/// Per-publish delivery tally.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct Bus<T> {
    subscribers: Mutex<HashMap<SubscriberId, Subscriber<T>>>,
}

impl<T> Bus<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    // A panicking session cannot leave the map half-updated, so a poisoned
    // lock is still safe to use.
    fn live(&self) -> MutexGuard<'_, HashMap<SubscriberId, Subscriber<T>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a subscriber to the live set.
    pub fn register(&self, subscriber: Subscriber<T>) {
        let mut live = self.live();
        debug!(subscriber_id = %subscriber.id, "registered subscriber");
        live.insert(subscriber.id.clone(), subscriber);
    }

    /// Removes a subscriber from the live set. Returns `false` if it was
    /// already gone.
    pub fn unregister(&self, id: &SubscriberId) -> bool {
        let removed = self.live().remove(id).is_some();
        if removed {
            debug!(subscriber_id = %id, "unregistered subscriber");
        }
        removed
    }

    /// Offers `message` to every live subscriber without ever waiting.
    pub fn publish(&self, message: T) -> PublishReport {
        let message = Arc::new(message);
        let live = self.live();
        let mut report = PublishReport::default();

        for subscriber in live.values() {
            match subscriber.offer(message.clone()) {
                Delivery::Queued => report.delivered += 1,
                Delivery::Dropped => {
                    report.dropped += 1;
                    debug!(subscriber_id = %subscriber.id, "subscriber queue full; message dropped");
                }
                // The session is tearing down and will unregister itself.
                Delivery::Closed => {}
            }
        }

        trace!(
            delivered = report.delivered,
            dropped = report.dropped,
            "published message"
        );
        report
    }

    /// Drops every subscriber. Each session sees its queue close and exits.
    pub fn clear(&self) {
        let mut live = self.live();
        let count = live.len();
        live.clear();
        debug!(count, "cleared all subscribers");
    }

    pub fn len(&self) -> usize {
        self.live().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live().is_empty()
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.live().contains_key(id)
    }
}

impl<T> Default for Bus<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a subscriber registered for as long as it is alive.
///
/// Dropping the guard unregisters the subscriber, which covers every way a
/// session can end, panics included.
pub struct Registration<T> {
    bus: Arc<Bus<T>>,
    id: SubscriberId,
}

impl<T> Registration<T> {
    pub fn new(bus: Arc<Bus<T>>, subscriber: Subscriber<T>) -> Self {
        let id = subscriber.id.clone();
        bus.register(subscriber);
        Self { bus, id }
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }
}

impl<T> Drop for Registration<T> {
    fn drop(&mut self) {
        self.bus.unregister(&self.id);
    }
}
