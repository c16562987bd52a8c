//! Per-connection session
//!
//! A session drives one client through `Initializing -> Streaming -> Closed`:
//! replay whatever the catch-up resolver returns (or a heartbeat), register a
//! fresh subscriber with the bus, then forward queued messages until the hub
//! shuts down, the client disconnects or the bus drops the subscriber.
//!
//! The subscriber is held through a [`Registration`] guard, so it leaves the
//! bus on every exit path.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use super::sse::SseHandler;
use super::writer::EventWriter;
use crate::broker::Registration;
use crate::client::{DropCounter, Subscriber};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Initializing,
    Streaming,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The hub-wide shutdown token fired.
    Shutdown,
    /// The client stopped reading, or a write to it failed.
    Disconnected,
    /// The bus dropped our subscriber (cleared on shutdown).
    BusCleared,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::Shutdown => "shutdown",
            CloseReason::Disconnected => "disconnected",
            CloseReason::BusCleared => "bus cleared",
        };
        f.write_str(reason)
    }
}

pub struct Session<T> {
    hub: Arc<SseHandler<T>>,
    writer: EventWriter,
    last_event_id: String,
    remote_addr: Option<SocketAddr>,
    state: SessionState,
}

impl<T> Session<T>
where
    T: Serialize + Send + Sync + 'static,
{
    pub fn new(
        hub: Arc<SseHandler<T>>,
        writer: EventWriter,
        last_event_id: String,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            hub,
            writer,
            last_event_id,
            remote_addr,
            state: SessionState::Initializing,
        }
    }

    /// Runs the session to completion.
    pub async fn run(mut self) -> CloseReason {
        if let Err(reason) = self.catch_up().await {
            return self.close(reason, None);
        }

        let (subscriber, mut queue) = Subscriber::channel(self.hub.settings().queue_capacity);
        let drops = subscriber.drop_counter();
        let registration = Registration::new(self.hub.bus().clone(), subscriber);
        self.state = SessionState::Streaming;
        info!(
            subscriber_id = %registration.id(),
            remote_addr = %display_addr(self.remote_addr),
            "Opened SSE connection"
        );

        let reason = self.stream(&mut queue).await;
        drop(registration);
        self.close(reason, Some(drops))
    }

    /// Replays the backlog for `last_event_id`, or sends a heartbeat so the
    /// stream shows activity straight away.
    async fn catch_up(&mut self) -> Result<(), CloseReason> {
        let written = match self.hub.on_connect() {
            Some(resolve) => {
                let backlog = resolve(&self.last_event_id);
                debug!(
                    last_event_id = %self.last_event_id,
                    count = backlog.len(),
                    "Resolved catch-up messages"
                );
                self.hub.formatter().write_all(self.writer.buffer(), &backlog)
            }
            None => 0,
        };

        if written == 0 {
            self.writer.heartbeat();
        }
        self.flush().await
    }

    async fn stream(&mut self, queue: &mut mpsc::Receiver<Arc<T>>) -> CloseReason {
        let interval = self.hub.settings().heartbeat_interval();
        let idle = time::sleep(interval);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                biased;

                () = self.hub.shutdown().cancelled() => return CloseReason::Shutdown,

                () = self.writer.closed() => return CloseReason::Disconnected,

                message = queue.recv() => {
                    let Some(message) = message else {
                        return CloseReason::BusCleared;
                    };
                    self.write_batch(message, queue);
                    if let Err(reason) = self.flush().await {
                        return reason;
                    }
                }

                () = &mut idle => {
                    self.writer.heartbeat();
                    if let Err(reason) = self.flush().await {
                        return reason;
                    }
                }
            }

            idle.as_mut().reset(Instant::now() + interval);
        }
    }

    // A client that stops reading fills the body channel and parks the send,
    // so the flush has to stay interruptible by shutdown.
    async fn flush(&mut self) -> Result<(), CloseReason> {
        tokio::select! {
            biased;

            () = self.hub.shutdown().cancelled() => Err(CloseReason::Shutdown),

            sent = self.writer.flush() => sent.map_err(|_| CloseReason::Disconnected),
        }
    }

    // Formats `first` plus whatever else is already queued so they go out in
    // a single flush.
    fn write_batch(&mut self, first: Arc<T>, queue: &mut mpsc::Receiver<Arc<T>>) {
        let mut batch = vec![first];
        while let Ok(next) = queue.try_recv() {
            batch.push(next);
        }
        self.hub
            .formatter()
            .write_all(self.writer.buffer(), batch.iter().map(|m| m.as_ref()));
    }

    fn close(&mut self, reason: CloseReason, drops: Option<DropCounter>) -> CloseReason {
        let remote_addr = display_addr(self.remote_addr);
        debug!(remote_addr = %remote_addr, from = ?self.state, "Session closing");
        self.state = SessionState::Closed;

        match reason {
            CloseReason::Shutdown => info!(
                remote_addr = %remote_addr,
                "Server is shutting down; abandoning SSE connection"
            ),
            CloseReason::Disconnected | CloseReason::BusCleared => {
                info!(remote_addr = %remote_addr, %reason, "Closed SSE connection")
            }
        }

        if let Some(dropped) = drops.map(|d| d.get()).filter(|n| *n > 0) {
            warn!(remote_addr = %remote_addr, dropped, "Subscriber queue overflowed during session");
        }
        reason
    }
}

fn display_addr(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
