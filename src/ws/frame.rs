#![expect(
    clippy::module_name_repetitions,
    reason = "Frame types deliberately include the module name for clarity"
)]

//! JSON wire frames layered over the socket.
//!
//! The transport is permissive: any frame that decodes as JSON is forwarded
//! to subscribers verbatim, except heartbeat replies, which are consumed by
//! the liveness monitor and never reach application code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Application-level heartbeat frames.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Heartbeat {
    /// Liveness probe carrying the send time in epoch milliseconds
    Ping { timestamp: i64 },
    /// Reply to a probe; matched by type only, never correlated to a probe
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
}

impl Heartbeat {
    /// Build a probe stamped with the current wall-clock time.
    #[must_use]
    pub fn ping_now() -> Self {
        Self::Ping {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Outcome of decoding an inbound text frame.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A heartbeat reply
    HeartbeatReply,
    /// Any other JSON payload, forwarded without schema enforcement
    Application(Value),
}

/// Decode an inbound text frame.
///
/// A decode error means the frame was not valid JSON; callers drop such
/// frames without surfacing them to subscribers or touching connection state.
pub fn decode(text: &str) -> Result<InboundFrame, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;

    // A peer-originated "ping" is application traffic at this layer; only
    // the pong reply shape is claimed by the heartbeat monitor.
    if let Ok(Heartbeat::Pong { .. }) = Heartbeat::deserialize(&value) {
        return Ok(InboundFrame::HeartbeatReply);
    }

    Ok(InboundFrame::Application(value))
}
