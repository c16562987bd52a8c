use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{self, error::TrySendError};

pub type SubscriberId = String;

/// Outcome of offering one message to a subscriber's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The queue was full; the message was dropped for this subscriber only.
    Dropped,
    /// The receiving session is gone.
    Closed,
}

/// The sending half of a bounded per-connection mailbox.
///
/// The broadcast bus holds one of these for every live connection. The
/// matching `mpsc::Receiver` is owned by the connection's session task.
#[derive(Debug)]
pub struct Subscriber<T> {
    /// Unique identifier for the subscriber (`sub-<uuid>`).
    pub id: SubscriberId,

    sender: mpsc::Sender<Arc<T>>,
    dropped: Arc<AtomicU64>,
}

impl<T> Subscriber<T> {
    /// Creates a subscriber with a queue of `capacity` messages and returns it
    /// together with the receiving half.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<T>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let subscriber = Self {
            id: format!("sub-{}", uuid::Uuid::new_v4()),
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (subscriber, receiver)
    }

    /// Non-blocking enqueue.
    pub fn offer(&self, message: Arc<T>) -> Delivery {
        match self.sender.try_send(message) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Shared handle on the drop counter, readable after the subscriber has
    /// been handed to the bus.
    pub fn drop_counter(&self) -> DropCounter {
        DropCounter(self.dropped.clone())
    }
}

/// Read-only view of how many messages a subscriber lost to a full queue.
#[derive(Debug, Clone)]
pub struct DropCounter(Arc<AtomicU64>);

impl DropCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
