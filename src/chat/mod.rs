//! Chat-side bookkeeping layered on the connection manager.
//!
//! The store is a pure subscriber of the transport: it decodes inbound
//! payloads into chat messages, tracks per-contact history and unread counts,
//! and hands outbound messages to [`crate::ws::ConnectionManager`], which
//! queues them while offline.

pub mod store;
pub mod types;

pub use store::ChatStore;
pub use types::{ChatMessage, Contact, IncomingChat};
