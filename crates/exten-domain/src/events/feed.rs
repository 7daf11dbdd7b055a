//! Callback-based change feed
//!
//! Listeners are registered explicitly, usually at construction time, and
//! are invoked synchronously on the publishing thread. Every listener that is
//! subscribed when `publish` starts receives the event at least once; there
//! is no ordering guarantee between distinct events published concurrently.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct FeedInner<E> {
    next_id: AtomicU64,
    listeners: DashMap<u64, Listener<E>>,
}

/// Fan-out of events of type `E` to registered callbacks
pub struct ChangeFeed<E> {
    inner: Arc<FeedInner<E>>,
}

impl<E: Send + Sync + 'static> ChangeFeed<E> {
    /// Create a feed with no listeners
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FeedInner {
                next_id: AtomicU64::new(0),
                listeners: DashMap::new(),
            }),
        }
    }

    /// Register a callback; it stays registered until the returned guard is dropped
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.insert(id, Arc::new(listener));

        let feed: Weak<FeedInner<E>> = Arc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(feed) = feed.upgrade() {
                    feed.listeners.remove(&id);
                }
            })),
        }
    }

    /// Deliver `event` to every listener, returning how many were called
    pub fn publish(&self, event: &E) -> usize {
        // Snapshot first so listeners may subscribe or unsubscribe re-entrantly.
        let listeners: Vec<Listener<E>> = self
            .inner
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for listener in &listeners {
            listener(event);
        }
        trace!(listeners = listeners.len(), "Published change event");
        listeners.len()
    }

    /// Number of registered listeners
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Whether anybody is listening
    pub fn has_subscribers(&self) -> bool {
        !self.inner.listeners.is_empty()
    }
}

impl<E: Send + Sync + 'static> Default for ChangeFeed<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for ChangeFeed<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for ChangeFeed<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.inner.listeners.len())
            .finish()
    }
}

/// Guard returned by [`ChangeFeed::subscribe`]; dropping it unsubscribes
#[must_use = "dropping the subscription unsubscribes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unsubscribe now instead of on drop
    pub fn cancel(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
