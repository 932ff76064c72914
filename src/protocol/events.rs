//! Typed event emitter with owner-scoped subscriptions.
//!
//! Handlers are called outside the emitter's lock, so a handler may
//! subscribe, unsubscribe or emit again without deadlocking.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Handlers<E> {
    next_id: u64,
    entries: Vec<(u64, Handler<E>)>,
}

/// Broadcasts events of type `E` to every live subscription.
pub struct Emitter<E> {
    handlers: Arc<Mutex<Handlers<E>>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            handlers: Arc::clone(&self.handlers),
        }
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(Handlers {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<E: 'static> Emitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`; it stays registered until the guard is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut handlers = self.handlers.lock();
            let id = handlers.next_id;
            handlers.next_id += 1;
            handlers.entries.push((id, Arc::new(handler)));
            id
        };

        let weak: Weak<Mutex<Handlers<E>>> = Arc::downgrade(&self.handlers);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(handlers) = weak.upgrade() {
                    handlers.lock().entries.retain(|(entry, _)| *entry != id);
                }
            })),
        }
    }

    /// Call every handler registered at the time of the call, in order.
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = self
            .handlers
            .lock()
            .entries
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.lock().entries.len()
    }
}

/// Unsubscribes its handler when dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Every subscription one owner registered, disposed together.
#[derive(Debug, Default)]
pub struct Subscriptions(Vec<Subscription>);

impl Subscriptions {
    pub fn push(&mut self, subscription: Subscription) {
        self.0.push(subscription);
    }

    /// Drop every subscription held.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
