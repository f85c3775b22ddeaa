use std::sync::Arc;

use tokio::sync::RwLock;

use crate::channel::Channel;
use crate::message::Message;

/// Event name that matches every inbound event
pub const WILDCARD: &str = "*";

/// Callback invoked for each matching inbound message
pub type ListenerCallback = Arc<dyn Fn(&Channel, &Message) + Send + Sync>;

/// Callback invoked on connect or disconnect
pub type LifecycleCallback = Arc<dyn Fn(&Channel) + Send + Sync>;

/// A callback bound to an event name (or [`WILDCARD`])
#[derive(Clone)]
pub struct Listener {
    event: String,
    callback: ListenerCallback,
}

impl Listener {
    pub fn new(event: &str, callback: ListenerCallback) -> Self {
        Self {
            event: event.to_string(),
            callback,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn matches(&self, event: &str) -> bool {
        self.event == event || self.event == WILDCARD
    }

    pub(crate) fn invoke(&self, channel: &Channel, message: &Message) {
        (self.callback)(channel, message)
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

/// Ordered listener list.
///
/// Readers take an immutable snapshot; writers copy the list if a snapshot is
/// still alive, so dispatch never observes a half-applied registration.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: RwLock<Arc<Vec<Listener>>>,
}

impl ListenerRegistry {
    pub async fn push(&self, listener: Listener) {
        let mut guard = self.listeners.write().await;
        Arc::make_mut(&mut *guard).push(listener);
    }

    /// Remove every listener registered under exactly `event`.
    pub async fn remove_event(&self, event: &str) -> usize {
        let mut guard = self.listeners.write().await;
        let listeners = Arc::make_mut(&mut *guard);
        let before = listeners.len();
        listeners.retain(|l| l.event != event);
        before - listeners.len()
    }

    pub async fn snapshot(&self) -> Arc<Vec<Listener>> {
        Arc::clone(&*self.listeners.read().await)
    }
}
