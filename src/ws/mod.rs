//! Core WebSocket infrastructure.
//!
//! This module keeps a single persistent message-stream socket logically
//! "always connected" over an unreliable transport: it establishes the
//! socket, detects silent death via heartbeats, reconnects with bounded
//! exponential backoff, buffers outbound traffic while disconnected, and
//! fans inbound payloads and status transitions out to subscribers.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: public handle plus a single owning actor task
//! - [`state`]: the connection lifecycle as an explicit state machine
//! - [`frame`]: JSON wire frames, including the heartbeat ping/pong pair
//!
//! # Example
//!
//! ```ignore
//! let manager = ConnectionManager::new(Config::default());
//! let _sub = manager.on_status_change(|status| println!("now {status}"));
//! manager.connect();
//! manager.send(&serde_json::json!({"message": {"from": "me", "message": "hi"}}))?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod frame;
mod queue;
pub mod state;

pub use config::{Config, ConfigUpdate};
pub use connection::{ConnectionManager, Subscription};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use events::ListenerToken;
pub use state::ConnectionStatus;
