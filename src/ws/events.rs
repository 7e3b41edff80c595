//! Listener registries for inbound payloads and status transitions.
//!
//! Registries are owned by the connection actor; registration and removal
//! arrive as commands on the same queue as everything else, so the listener
//! set can never change underneath an in-flight notification pass.

use serde_json::Value;

use super::state::ConnectionStatus;

pub(crate) type MessageCallback = Box<dyn Fn(&Value) + Send>;
pub(crate) type StatusCallback = Box<dyn Fn(ConnectionStatus) + Send>;

/// Opaque handle identifying a registered listener.
///
/// Removal is by token, not by callback identity, and is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub(crate) u64);

pub(crate) struct EventBus {
    message: Vec<(ListenerToken, MessageCallback)>,
    status: Vec<(ListenerToken, StatusCallback)>,
    last_status: ConnectionStatus,
}

impl EventBus {
    pub(crate) fn new(initial: ConnectionStatus) -> Self {
        Self {
            message: Vec::new(),
            status: Vec::new(),
            last_status: initial,
        }
    }

    pub(crate) fn add_message(&mut self, token: ListenerToken, callback: MessageCallback) {
        self.message.push((token, callback));
    }

    pub(crate) fn add_status(&mut self, token: ListenerToken, callback: StatusCallback) {
        self.status.push((token, callback));
    }

    /// Remove a listener from whichever registry holds it. Unknown tokens are
    /// a no-op.
    pub(crate) fn remove(&mut self, token: ListenerToken) {
        self.message.retain(|(t, _)| *t != token);
        self.status.retain(|(t, _)| *t != token);
    }

    pub(crate) fn clear(&mut self) {
        self.message.clear();
        self.status.clear();
    }

    /// Notify message listeners in registration order.
    pub(crate) fn notify_message(&self, payload: &Value) {
        for (_, callback) in &self.message {
            callback(payload);
        }
    }

    /// Notify status listeners in registration order.
    ///
    /// Edge-triggered: repeating the previous status notifies nobody.
    pub(crate) fn notify_status(&mut self, status: ConnectionStatus) {
        if self.last_status == status {
            return;
        }
        self.last_status = status;
        for (_, callback) in &self.status {
            callback(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    use serde_json::json;

    use super::*;

    #[test]
    fn message_listeners_fire_in_registration_order() {
        let (tx, rx) = mpsc::channel();
        let mut bus = EventBus::new(ConnectionStatus::Disconnected);

        for id in 0..3_u64 {
            let tx = tx.clone();
            bus.add_message(
                ListenerToken(id),
                Box::new(move |_| tx.send(id).expect("receiver gone")),
            );
        }

        bus.notify_message(&json!({"hello": "world"}));

        let order: Vec<u64> = rx.try_iter().collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn removal_is_exact_and_idempotent() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new(ConnectionStatus::Disconnected);

        for id in 0..2_u64 {
            let count = Arc::clone(&count);
            bus.add_message(
                ListenerToken(id),
                Box::new(move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        bus.remove(ListenerToken(0));
        bus.remove(ListenerToken(0)); // second removal changes nothing
        bus.notify_message(&json!(1));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_status_never_double_notifies() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new(ConnectionStatus::Disconnected);

        let counter = Arc::clone(&count);
        bus.add_status(
            ListenerToken(0),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.notify_status(ConnectionStatus::Connecting);
        bus.notify_status(ConnectionStatus::Connecting);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn initial_status_is_not_a_transition() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new(ConnectionStatus::Disconnected);

        let counter = Arc::clone(&count);
        bus.add_status(
            ListenerToken(0),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.notify_status(ConnectionStatus::Disconnected);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn status_listeners_receive_the_new_status() {
        let (tx, rx) = mpsc::channel();
        let mut bus = EventBus::new(ConnectionStatus::Disconnected);

        bus.add_status(
            ListenerToken(0),
            Box::new(move |status| tx.send(status).expect("receiver gone")),
        );

        bus.notify_status(ConnectionStatus::Connecting);
        bus.notify_status(ConnectionStatus::Connected);

        let seen: Vec<ConnectionStatus> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]
        );
    }

    #[test]
    fn clear_empties_both_registries() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut bus = EventBus::new(ConnectionStatus::Disconnected);

        let c1 = Arc::clone(&count);
        bus.add_message(
            ListenerToken(0),
            Box::new(move |_| {
                c1.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let c2 = Arc::clone(&count);
        bus.add_status(
            ListenerToken(1),
            Box::new(move |_| {
                c2.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.clear();
        bus.notify_message(&json!(1));
        bus.notify_status(ConnectionStatus::Connecting);

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
