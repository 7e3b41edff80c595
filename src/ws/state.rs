//! Connection lifecycle state machine.
//!
//! Every legal state change lives in [`transition`]; the connection actor
//! feeds it events and executes the returned effects. Keeping the table pure
//! makes transition legality testable without timers or sockets.

use std::fmt;

/// High-level connection status surface.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected, no reconnect pending
    Disconnected,
    /// A socket open is in flight
    Connecting,
    /// Socket open and passing liveness probes
    Connected,
    /// Waiting out a backoff delay before the next attempt
    Reconnecting,
    /// Failed; recovery requires an explicit connect or force-reconnect
    Error,
}

impl ConnectionStatus {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events observed by the connection actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionEvent {
    /// `connect()` was called, a force-reconnect found no socket, or the
    /// reconnect timer fired
    ConnectRequested,
    /// The transport handshake completed
    OpenSucceeded,
    /// The transport failed before the handshake completed
    OpenFailed,
    /// The transport could not even be instantiated (e.g. unparseable URL)
    ConstructionFailed,
    /// The transport reported an error on an established socket
    TransportErrored,
    /// The socket terminated without a local `disconnect()`
    UncleanClosed,
    /// `disconnect()` was called
    DisconnectRequested,
}

/// Side effects the actor must run after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Effect {
    /// Cancel heartbeat interval, pong deadline, and reconnect timer
    ClearTimers,
    /// Reset the reconnect attempt counter (and backoff state) to zero
    ResetAttempts,
    /// Arm the heartbeat interval
    StartHeartbeat,
    /// Drain the outbound queue onto the now-open socket
    FlushQueue,
    /// Compute the next backoff delay and arm the reconnect timer
    ScheduleReconnect,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Transition {
    pub next: ConnectionStatus,
    pub effects: &'static [Effect],
}

impl Transition {
    const fn to(next: ConnectionStatus, effects: &'static [Effect]) -> Self {
        Self { next, effects }
    }

    const fn stay(current: ConnectionStatus) -> Self {
        Self {
            next: current,
            effects: &[],
        }
    }
}

/// The single transition function.
///
/// `can_reconnect` is the recoverability input: whether the attempt counter is
/// still below the configured ceiling at the instant the event is evaluated.
pub(crate) fn transition(
    current: ConnectionStatus,
    event: ConnectionEvent,
    can_reconnect: bool,
) -> Transition {
    use ConnectionEvent as Event;
    use ConnectionStatus as Status;

    match (current, event) {
        // Re-entrant connect while a socket is mid-open is a no-op.
        (Status::Connecting, Event::ConnectRequested) => Transition::stay(current),
        // Leaving the terminal error state resets the reconnect budget.
        (Status::Error, Event::ConnectRequested) => Transition::to(
            Status::Connecting,
            &[Effect::ClearTimers, Effect::ResetAttempts],
        ),
        (_, Event::ConnectRequested) => {
            Transition::to(Status::Connecting, &[Effect::ClearTimers])
        }

        (Status::Connecting, Event::OpenSucceeded) => Transition::to(
            Status::Connected,
            &[
                Effect::ResetAttempts,
                Effect::StartHeartbeat,
                Effect::FlushQueue,
            ],
        ),
        // A stale open result after disconnect/cleanup changes nothing.
        (_, Event::OpenSucceeded) => Transition::stay(current),

        (Status::Connecting, Event::OpenFailed) => recover(can_reconnect),
        (_, Event::OpenFailed) => Transition::stay(current),

        // Construction failures are fatal for the attempt and skip the
        // recoverability check entirely.
        (_, Event::ConstructionFailed) => {
            Transition::to(Status::Error, &[Effect::ClearTimers])
        }

        // The error signal alone never tears the connection down; a closure
        // event arrives separately and drives recovery.
        (_, Event::TransportErrored) => {
            Transition::to(Status::Error, &[Effect::ClearTimers])
        }

        (
            Status::Connected | Status::Connecting | Status::Error,
            Event::UncleanClosed,
        ) => recover(can_reconnect),
        (Status::Disconnected | Status::Reconnecting, Event::UncleanClosed) => {
            Transition::stay(current)
        }

        (_, Event::DisconnectRequested) => Transition::to(
            Status::Disconnected,
            &[Effect::ClearTimers, Effect::ResetAttempts],
        ),
    }
}

/// Recoverability check shared by every unclean-termination edge.
fn recover(can_reconnect: bool) -> Transition {
    if can_reconnect {
        Transition::to(
            ConnectionStatus::Reconnecting,
            &[Effect::ClearTimers, Effect::ScheduleReconnect],
        )
    } else {
        Transition::to(ConnectionStatus::Error, &[Effect::ClearTimers])
    }
}
