//! Wire formatting for the `text/event-stream` protocol.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, warn};

/// A content-free comment frame. Keeps proxies from timing out idle streams.
pub const HEARTBEAT: &str = ":\n\n";

/// Maps a message to the id sent in its `id:` field. An empty string means
/// the message has no id.
pub type ResolveEventId<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Renders messages as `id:` / `data:` frames.
pub struct Formatter<T> {
    resolve_event_id: Option<ResolveEventId<T>>,
}

impl<T: Serialize> Formatter<T> {
    pub fn new(resolve_event_id: Option<ResolveEventId<T>>) -> Self {
        Self { resolve_event_id }
    }

    /// Appends one frame per message to `buf` and returns how many were
    /// written. Messages that fail to serialize are logged and skipped.
    pub fn write_all<'a, I>(&self, buf: &mut String, messages: I) -> usize
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let mut written = 0;
        for message in messages {
            match self.write_one(buf, message) {
                Ok(()) => written += 1,
                Err(e) => error!(error = %e, "Failed to serialize SSE message as JSON"),
            }
        }
        written
    }

    fn write_one(&self, buf: &mut String, message: &T) -> Result<(), serde_json::Error> {
        // Serialize first so a failure leaves `buf` untouched.
        let data = serde_json::to_string(message)?;

        let event_id = self
            .resolve_event_id
            .as_ref()
            .map(|resolve| resolve(message))
            .unwrap_or_default();

        if event_id.contains(['\n', '\r']) {
            warn!(event_id = %event_id.escape_debug(), "Event id contains a line break; omitting it");
        } else if !event_id.is_empty() {
            buf.push_str("id: ");
            buf.push_str(&event_id);
            buf.push('\n');
        }

        buf.push_str("data: ");
        buf.push_str(&data);
        buf.push_str("\n\n");
        Ok(())
    }
}
