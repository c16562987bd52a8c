//! # ssehub
//!
//! `ssehub` is a real-time broadcast hub that fans a stream of application
//! messages out to many long-lived HTTP clients over Server-Sent Events, with
//! replay for clients that reconnect.
//!
//! ## Core Modules
//!
//! - `broker`: the broadcast bus holding every live subscriber queue, and the
//!   controller that feeds it from the application's message source.
//! - `client`: the bounded per-connection subscriber queue.
//! - `transport`: the `text/event-stream` endpoint, per-connection sessions,
//!   wire formatting and request logging middleware.
//! - `app`: a ready-made relay wiring the hub to publish and health routes.
//! - `config`: loading settings from files and environment variables.
//! - `server`: running the HTTP server with graceful shutdown.
//! - `utils`: the shared error type and logging setup.

pub mod app;
pub mod broker;
pub mod client;
pub mod config;
pub mod server;
pub mod transport;
pub mod utils;

pub use broker::Bus;
pub use transport::SseHandler;
pub use utils::HubError;
