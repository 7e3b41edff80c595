#![expect(
    clippy::module_name_repetitions,
    reason = "Store types deliberately include the module name for clarity"
)]

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::{DashMap, Entry};
use serde::Deserialize as _;

use super::types::{ChatMessage, Contact, IncomingChat};
use crate::Result;
use crate::error::Error;
use crate::util::random_id;
use crate::ws::connection::Subscription;
use crate::ws::ConnectionManager;

const DEFAULT_USER_NAME: &str = "You";

/// Conversation and contact bookkeeping fed by the connection manager.
///
/// The store is a pure subscriber: it never drives the connection lifecycle.
/// Cloning is cheap; all clones share the same contact registry.
#[derive(Clone)]
pub struct ChatStore {
    inner: Arc<Inner>,
}

struct Inner {
    connection: ConnectionManager,
    contacts: DashMap<String, Contact>,
    active: RwLock<Option<String>>,
    current_user: RwLock<String>,
}

impl ChatStore {
    /// Create a store bound to a connection manager.
    #[must_use]
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            inner: Arc::new(Inner {
                connection,
                contacts: DashMap::new(),
                active: RwLock::new(None),
                current_user: RwLock::new(DEFAULT_USER_NAME.to_owned()),
            }),
        }
    }

    /// Register this store as a message subscriber on its connection.
    ///
    /// Payloads that do not decode as the chat envelope are ignored.
    pub fn attach(&self) -> Subscription {
        let store = self.clone();
        self.inner.connection.on_message(move |payload| {
            match IncomingChat::deserialize(payload) {
                Ok(incoming) => store.receive(incoming),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %e, "ignoring non-chat payload");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &e;
                }
            }
        })
    }

    /// Record an inbound message against its sender's conversation.
    pub fn receive(&self, incoming: IncomingChat) {
        self.add_or_update(&incoming.message.from, &incoming.message.message, false);
    }

    /// Record an own message against the active conversation and hand it to
    /// the connection (which queues it while offline).
    pub fn send_message(&self, body: &str) -> Result<()> {
        let Some(active) = self.active_contact_name() else {
            return Err(Error::validation("no active contact selected"));
        };

        self.add_or_update(&active, body, true);

        let envelope = IncomingChat::new(self.current_user(), body);
        self.inner.connection.send(&envelope)
    }

    /// Mark a contact as active and clear its unread count.
    pub fn set_active(&self, name: &str) {
        *self
            .inner
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(name.to_owned());

        if let Some(mut contact) = self.inner.contacts.get_mut(name) {
            contact.unread = 0;
        }
    }

    pub fn clear_active(&self) {
        *self
            .inner
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[must_use]
    pub fn active_contact_name(&self) -> Option<String> {
        self.inner
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn active_contact(&self) -> Option<Contact> {
        let name = self.active_contact_name()?;
        self.contact(&name)
    }

    #[must_use]
    pub fn contact(&self, name: &str) -> Option<Contact> {
        self.inner.contacts.get(name).map(|c| c.clone())
    }

    /// All contacts, most recently active first.
    #[must_use]
    pub fn contacts_by_recency(&self) -> Vec<Contact> {
        let mut contacts: Vec<Contact> = self
            .inner
            .contacts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        contacts.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
        contacts
    }

    #[must_use]
    pub fn current_user(&self) -> String {
        self.inner
            .current_user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_current_user(&self, name: impl Into<String>) {
        *self
            .inner
            .current_user
            .write()
            .unwrap_or_else(PoisonError::into_inner) = name.into();
    }

    /// The connection this store subscribes to.
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    fn add_or_update(&self, name: &str, body: &str, own: bool) {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let message = ChatMessage {
            id: random_id(),
            from: if own { self.current_user() } else { name.to_owned() },
            message: body.to_owned(),
            timestamp,
            own,
        };

        match self.inner.contacts.entry(name.to_owned()) {
            Entry::Occupied(mut entry) => {
                let contact = entry.get_mut();
                contact.messages.push(message);
                contact.last_message = body.to_owned();
                contact.last_message_time = timestamp;

                if !own && self.active_contact_name().as_deref() != Some(name) {
                    contact.unread += 1;
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Contact {
                    name: name.to_owned(),
                    last_message: body.to_owned(),
                    last_message_time: timestamp,
                    unread: u32::from(!own),
                    messages: vec![message],
                });
            }
        }
    }
}
