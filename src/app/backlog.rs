use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Bounded in-memory history of recently published messages, keyed by event id.
///
/// Serves as the catch-up resolver for reconnecting clients:
/// - an empty cursor means a fresh client, so nothing is replayed;
/// - a known cursor replays everything recorded after it;
/// - an unknown cursor (already evicted, or never seen) replays the whole
///   retained history, since the client's gap cannot be measured.
pub struct Backlog<T> {
    capacity: usize,
    entries: Mutex<VecDeque<(String, T)>>,
}

impl<T: Clone> Backlog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub fn record(&self, id: impl Into<String>, message: T) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back((id.into(), message));
    }

    pub fn since(&self, last_event_id: &str) -> Vec<T> {
        if last_event_id.is_empty() {
            return Vec::new();
        }

        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let start = entries
            .iter()
            .position(|(id, _)| id == last_event_id)
            .map_or(0, |pos| pos + 1);

        entries.iter().skip(start).map(|(_, m)| m.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
