//! Subscription registry.
//!
//! Tracks callback registrations keyed by event string, the order in which
//! events were first registered, and the binding from upstream channel ids
//! to event strings for the current connection. Callback registrations are
//! permanent for the life of the client; channel bindings only last until
//! the next reconnect.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

/// Callback invoked with the payload fields of a channel update (everything
/// after the channel id).
pub type Callback = Arc<dyn Fn(&[Value]) + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    callbacks: HashMap<String, Vec<Callback>>,
    /// Events in first-registration order, for resubscription after a
    /// reconnect.
    order: Vec<String>,
    channel_to_event: HashMap<i64, String>,
}

/// Shared registry of subscriptions and their callbacks.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for an event.
    ///
    /// Returns true when this is the first callback for the event, in which
    /// case the caller owes the upstream a subscribe request.
    pub fn register(&self, evt: &str, callback: Callback) -> bool {
        let mut inner = self.inner.lock();
        let is_new = !inner.callbacks.contains_key(evt);
        if is_new {
            inner.order.push(evt.to_string());
        }
        inner
            .callbacks
            .entry(evt.to_string())
            .or_default()
            .push(callback);
        is_new
    }

    /// Bind an upstream channel id to an event for the current connection.
    pub fn bind_channel(&self, chan_id: i64, evt: &str) {
        self.inner
            .lock()
            .channel_to_event
            .insert(chan_id, evt.to_string());
    }

    /// Resolve the event bound to a channel id, if any.
    pub fn resolve_channel(&self, chan_id: i64) -> Option<String> {
        self.inner.lock().channel_to_event.get(&chan_id).cloned()
    }

    /// Drop every channel binding. Callback registrations survive.
    pub fn clear_channel_bindings(&self) {
        self.inner.lock().channel_to_event.clear();
    }

    /// Snapshot the callbacks registered for an event, in registration order.
    ///
    /// Returning a snapshot lets callers invoke callbacks without holding the
    /// registry lock, so a callback may itself register new subscriptions.
    pub fn callbacks_for(&self, evt: &str) -> Vec<Callback> {
        self.inner
            .lock()
            .callbacks
            .get(evt)
            .map(|callbacks| callbacks.to_vec())
            .unwrap_or_default()
    }

    /// Events with at least one registered callback, in first-registration
    /// order.
    pub fn subscribed_events(&self) -> Vec<String> {
        self.inner.lock().order.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
