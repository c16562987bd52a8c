use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// A message published through the relay.
///
/// The sequence id travels in the SSE `id:` field, so it is left out of the
/// JSON `data:` payload.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(skip)]
    pub id: u64,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl Event {
    pub fn new(id: u64, payload: Value) -> Self {
        Self {
            id,
            payload,
            published_at: Utc::now(),
        }
    }

    pub fn event_id(&self) -> String {
        self.id.to_string()
    }
}
