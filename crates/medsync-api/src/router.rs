//! Typed-callback fan-out for realtime events.
//!
//! The [`Router`] keeps a registry of listeners. Every classified event is
//! delivered synchronously to all listeners registered at dispatch time, in
//! registration order. A panicking listener is logged and skipped; the rest
//! still run.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::events::{Decoded, RealtimeEvent, decode_frame};

/// Callback invoked for each dispatched event.
pub type Listener = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Listener registry and dispatcher.
///
/// Cheaply cloneable; clones share the same registry.
#[derive(Clone, Default)]
pub struct Router {
    inner: Arc<Registry>,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener)>>,
}

impl Registry {
    fn remove(&self, id: u64) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(lid, _)| *lid != id);
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is dropped or explicitly unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        tracing::trace!(listener_id = id, "listener registered");

        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
            detached: false,
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver `event` to every registered listener.
    ///
    /// Returns how many listeners completed without panicking.
    pub fn dispatch(&self, event: &RealtimeEvent) -> usize {
        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<(u64, Listener)> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    tracing::warn!(
                        listener_id = id,
                        event = event.kind(),
                        panic = panic_message(payload.as_ref()),
                        "listener panicked, continuing"
                    );
                }
            }
        }
        delivered
    }

    /// Decode one inbound text frame and dispatch it if it is a known event.
    ///
    /// Unknown discriminants are ignored; malformed frames are logged and
    /// dropped. Returns `true` when an event was dispatched.
    pub fn dispatch_frame(&self, text: &str) -> bool {
        match decode_frame(text) {
            Decoded::Event(event) => {
                tracing::debug!(event = event.kind(), "realtime event");
                self.dispatch(&event);
                true
            }
            Decoded::Ignored { kind } => {
                tracing::debug!(kind, "ignoring unknown realtime message type");
                false
            }
            Decoded::Malformed { reason } => {
                tracing::warn!(reason, "dropping malformed realtime frame");
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}

// ── Subscription ─────────────────────────────────────────────────────

/// Handle for a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
    detached: bool,
}

impl Subscription {
    /// Remove the listener now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Keep the listener registered for the lifetime of the router.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("detached", &self.detached)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.detached {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
            tracing::trace!(listener_id = self.id, "listener removed");
        }
    }
}
