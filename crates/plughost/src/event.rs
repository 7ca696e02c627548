//! # Events
//!
//! Explicit publish/subscribe used by both sides of the connection.
//!
//! ## Invariants
//!
//! - `subscribe` returns a `Subscription`; the listener stays registered until it is
//!   disposed. Dropping the handle does not unsubscribe.
//! - `fire` calls every listener registered at the moment of the call, synchronously and
//!   in registration order. Subscribing or disposing from inside a listener only affects
//!   later passes.

use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

pub struct Emitter<T> {
    listeners: Arc<Mutex<Listeners<T>>>,
}

impl<T: 'static> Emitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut listeners = self.listeners.lock();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Arc::new(listener)));
            id
        };
        let weak: Weak<Mutex<Listeners<T>>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.lock().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    pub fn fire(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by `Emitter::subscribe` and other registrations.
///
/// `dispose` runs the teardown at most once.
pub struct Subscription {
    teardown: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// A handle with nothing to tear down.
    pub fn empty() -> Self {
        Self {
            teardown: Mutex::new(None),
        }
    }

    pub fn dispose(&self) {
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.teardown.lock().is_none()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A group of subscriptions disposed together.
///
/// Anything added after `dispose` is disposed immediately.
#[derive(Default)]
pub struct DisposableStore {
    inner: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    items: Vec<Subscription>,
    disposed: bool,
}

impl DisposableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscription: Subscription) {
        let mut state = self.inner.lock();
        if state.disposed {
            drop(state);
            subscription.dispose();
            return;
        }
        state.items.push(subscription);
    }

    pub fn dispose(&self) {
        let items = {
            let mut state = self.inner.lock();
            state.disposed = true;
            std::mem::take(&mut state.items)
        };
        for item in items {
            item.dispose();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;

    #[test]
    fn test_fire_in_registration_order() {
        let emitter = Emitter::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = seen.clone();
        let _s1 = emitter.subscribe(move |v| a.lock().push(("a", *v)));
        let b = seen.clone();
        let _s2 = emitter.subscribe(move |v| b.lock().push(("b", *v)));

        emitter.fire(&7);
        assert_eq!(*seen.lock(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_dispose_removes_listener_once() {
        let emitter = Emitter::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = emitter.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        emitter.fire(&());
        sub.dispose();
        sub.dispose();
        emitter.fire(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.listener_count(), 0);
        assert!(sub.is_disposed());
    }

    #[test]
    fn test_dispose_during_fire_keeps_current_pass() {
        let emitter = Arc::new(Emitter::<()>::new());
        let count = Arc::new(AtomicUsize::new(0));
        let second: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot = second.clone();
        let _first = emitter.subscribe(move |_| {
            if let Some(sub) = slot.lock().as_ref() {
                sub.dispose();
            }
        });
        let c = count.clone();
        *second.lock() = Some(emitter.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        // The second listener was in the snapshot, so it still runs this pass.
        emitter.fire(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        emitter.fire(&());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_store_disposes_late_additions() {
        let store = DisposableStore::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        store.add(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        store.dispose();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = count.clone();
        store.add(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(store.is_empty());
    }
}
