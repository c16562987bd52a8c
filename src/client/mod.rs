//! The `client` module defines the per-connection side of the hub.
//!
//! It provides the `Subscriber` struct: the bounded mailbox through which the
//! broadcast bus hands messages to exactly one connection session.

pub mod subscriber;
pub use subscriber::{Delivery, DropCounter, Subscriber, SubscriberId};
