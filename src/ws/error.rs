#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// WebSocket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error connecting to or communicating with the WebSocket server
    Connection(tokio_tungstenite::tungstenite::Error),
    /// The configured endpoint address could not be parsed
    InvalidUrl(url::ParseError),
    /// Error parsing a WebSocket frame
    MessageParse(serde_json::Error),
    /// WebSocket connection was closed
    ConnectionClosed,
    /// No heartbeat reply arrived before the configured timeout
    HeartbeatTimeout,
    /// The reconnect budget is exhausted; an explicit reconnect is required
    ReconnectExhausted {
        /// Number of reconnect attempts that were made
        attempts: u32,
    },
    /// The connection manager has been torn down
    ManagerGone,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::InvalidUrl(e) => write!(f, "Invalid WebSocket endpoint: {e}"),
            Self::MessageParse(e) => write!(f, "Failed to parse WebSocket frame: {e}"),
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Self::HeartbeatTimeout => write!(f, "Heartbeat timed out waiting for pong"),
            Self::ReconnectExhausted { attempts } => {
                write!(f, "Reconnect attempts exhausted after {attempts} tries")
            }
            Self::ManagerGone => write!(f, "Connection manager has been cleaned up"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::InvalidUrl(e) => Some(e),
            Self::MessageParse(e) => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, WsError::Connection(e))
    }
}
