//! The `transport` module exposes the hub over HTTP.
//!
//! It renders messages in the `text/event-stream` wire format, runs one
//! session per connected client, and provides the request logging middleware
//! shared by every route.

pub mod format;
pub mod middleware;
pub mod session;
pub mod sse;
pub mod writer;

pub use format::{Formatter, HEARTBEAT};
pub use session::{CloseReason, Session};
pub use sse::{OnConnect, SseHandler, negotiate, stream_events};
