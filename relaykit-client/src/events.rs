//! Observer registry shared by every component
//!
//! Each component owns an [`EventBus`] for its own event enum. Registering a
//! listener returns a [`Subscription`] guard; dropping the guard removes the
//! listener, so cleanup happens on every exit path including early returns
//! and cancelled futures.
//!
//! Listeners are synchronous and must not block. Anything that needs to await
//! either spawns a task or forwards the event into a channel, which is what
//! [`EventBus::stream`] does.
//!
//! Single-use waits use [`EventBus::once`]: the returned [`Once`] resolves
//! with the first matching event and unregisters itself when consumed or
//! dropped.
//!
//! ```rust
//! use relaykit_client::EventBus;
//!
//! # async fn example() {
//! let bus: EventBus<u32> = EventBus::new();
//! let first_even = bus.once(|n| n % 2 == 0);
//!
//! bus.emit(1);
//! bus.emit(4);
//! assert_eq!(first_even.wait().await.unwrap(), 4);
//! assert_eq!(bus.listener_count(), 0);
//! # }
//! ```

use relaykit_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::{mpsc, oneshot};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    listeners: BTreeMap<u64, Listener<E>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of listeners for one event type
pub struct EventBus<E> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                listeners: BTreeMap::new(),
            })),
        }
    }

    /// Register a listener for every event
    #[must_use = "the listener is removed as soon as the subscription is dropped"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = lock(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.listeners.insert(id, Arc::new(listener));
            id
        };

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                lock(&registry).listeners.remove(&id);
            }
        })
    }

    /// Deliver an event to every listener registered at the time of the call
    ///
    /// Listeners run outside the registry lock, so they may subscribe or drop
    /// guards themselves.
    pub fn emit(&self, event: E) {
        let listeners: Vec<Listener<E>> = lock(&self.registry).listeners.values().cloned().collect();
        for listener in listeners {
            listener(&event);
        }
    }

    /// Wait for the first event matching `predicate`
    pub fn once<P>(&self, predicate: P) -> Once<E>
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let guard = self.subscribe(move |event| {
            if predicate(event) {
                if let Some(tx) = lock(&slot).take() {
                    let _ = tx.send(event.clone());
                }
            }
        });
        Once { rx, _guard: guard }
    }

    /// Forward every event into an unbounded channel
    ///
    /// The receiver processes events in emission order on its own task.
    pub fn stream(&self) -> EventStream<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        EventStream { rx, _guard: guard }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

/// Scoped listener registration; dropping it unregisters the listener
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new<F: FnOnce() + Send + Sync + 'static>(cancel: F) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Remove the listener now
    pub fn unsubscribe(mut self) {
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

/// Single-use completion signal created by [`EventBus::once`]
pub struct Once<E> {
    rx: oneshot::Receiver<E>,
    _guard: Subscription,
}

impl<E> Once<E> {
    /// Resolve with the matching event
    ///
    /// Fails only if the bus was dropped before a match arrived.
    pub async fn wait(self) -> Result<E> {
        let Once { rx, _guard } = self;
        rx.await
            .map_err(|_| Error::Internal("event source dropped before signalling".to_string()))
    }
}

/// Ordered stream of events created by [`EventBus::stream`]
pub struct EventStream<E> {
    rx: mpsc::UnboundedReceiver<E>,
    _guard: Subscription,
}

impl<E> EventStream<E> {
    pub async fn recv(&mut self) -> Option<E> {
        self.rx.recv().await
    }

    /// Stop receiving; already-queued events are discarded
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_subscribe_and_emit() {
        let bus: EventBus<String> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let _sub = bus.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit("a".into());
        bus.emit("b".into());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_drop_guard_unregisters() {
        let bus: EventBus<u8> = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let sub = bus.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bus.listener_count(), 1);

        drop(sub);
        assert_eq!(bus.listener_count(), 0);

        bus.emit(1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let bus: EventBus<u8> = EventBus::new();
        let sub = bus.subscribe(|_| {});
        sub.unsubscribe();
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_guard_outliving_bus_is_harmless() {
        let bus: EventBus<u8> = EventBus::new();
        let sub = bus.subscribe(|_| {});
        drop(bus);
        drop(sub);
    }

    #[tokio::test]
    async fn test_once_resolves_with_first_match_only() {
        let bus: EventBus<u32> = EventBus::new();
        let once = bus.once(|n| *n > 10);

        bus.emit(3);
        bus.emit(11);
        bus.emit(12);

        assert_eq!(once.wait().await.unwrap(), 11);
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_once_dropped_unregisters() {
        let bus: EventBus<u32> = EventBus::new();
        {
            let _once = bus.once(|_| true);
            assert_eq!(bus.listener_count(), 1);
        }
        assert_eq!(bus.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_once_fails_when_bus_dropped() {
        let bus: EventBus<u32> = EventBus::new();
        let once = bus.once(|_| true);
        drop(bus);

        let result = tokio::time::timeout(Duration::from_secs(1), once.wait())
            .await
            .unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stream_preserves_order() {
        let bus: EventBus<u32> = EventBus::new();
        let mut stream = bus.stream();

        for n in 0..5 {
            bus.emit(n);
        }

        for expected in 0..5 {
            assert_eq!(stream.recv().await, Some(expected));
        }
    }

    #[test]
    fn test_listener_may_subscribe_during_emit() {
        let bus: EventBus<u8> = EventBus::new();
        let bus_clone = bus.clone();
        let held = Arc::new(Mutex::new(Vec::new()));
        let held_clone = Arc::clone(&held);

        let _sub = bus.subscribe(move |_| {
            let inner = bus_clone.subscribe(|_| {});
            lock(&held_clone).push(inner);
        });

        bus.emit(1);
        assert_eq!(bus.listener_count(), 2);
    }
}
