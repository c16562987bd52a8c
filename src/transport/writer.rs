use std::convert::Infallible;

use axum::body::Bytes;
use tokio::sync::mpsc;

use super::format::HEARTBEAT;
use crate::utils::HubError;

/// One flushed piece of the response body.
pub type Chunk = Result<Bytes, Infallible>;

/// Buffered writer in front of a streaming response body.
///
/// Frames accumulate in memory and reach the client as a single body chunk
/// on [`flush`](EventWriter::flush). The receiving half is turned into the
/// response body; when the client goes away hyper drops it, which is what
/// [`closed`](EventWriter::closed) observes.
pub struct EventWriter {
    tx: mpsc::Sender<Chunk>,
    buf: String,
}

impl EventWriter {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Chunk>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let writer = Self {
            tx,
            buf: String::new(),
        };
        (writer, rx)
    }

    pub fn buffer(&mut self) -> &mut String {
        &mut self.buf
    }

    pub fn heartbeat(&mut self) {
        self.buf.push_str(HEARTBEAT);
    }

    /// Sends everything buffered so far as one chunk.
    pub async fn flush(&mut self) -> Result<(), HubError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.buf));
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| HubError::Disconnected)
    }

    /// Resolves once the client has stopped reading the response body.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}
