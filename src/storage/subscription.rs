//! Live snapshot listeners
//!
//! A listener is registered per user and collection. Whenever that
//! collection changes, the store re-reads it and hands every listener the
//! complete new snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::domain::UserId;

/// Receives the full, sorted contents of a collection
///
/// Called while the collection's deliveries are serialized: a callback may
/// read the store but must not write to it.
pub type SnapshotCallback<T> = Arc<dyn Fn(Vec<T>) + Send + Sync>;

/// Listeners for one collection
pub(crate) struct Registry<T> {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, (UserId, SnapshotCallback<T>)>>,
    /// Held while a snapshot is read and handed out
    delivery: Mutex<()>,
}

impl<T: 'static> Registry<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
            delivery: Mutex::new(()),
        })
    }

    /// Serialize snapshot deliveries for this collection
    ///
    /// A snapshot read under this guard reaches listeners before any later
    /// one, so a listener never sees an older snapshot after a newer one.
    pub(crate) fn deliver(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn add(self: &Arc<Self>, user: &UserId, callback: SnapshotCallback<T>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, (user.clone(), callback));
        }

        let registry: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.remove(id);
            }
        })
    }

    fn remove(&self, id: u64) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.remove(&id);
        }
    }

    /// Callbacks registered for `user`, cloned so none are called under the lock
    pub(crate) fn listeners_for(&self, user: &UserId) -> Vec<SnapshotCallback<T>> {
        match self.listeners.lock() {
            Ok(listeners) => listeners
                .values()
                .filter(|(owner, _)| owner == user)
                .map(|(_, callback)| callback.clone())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

/// Handle to a live listener
///
/// The listener stops receiving snapshots on `unsubscribe` or when the
/// handle is dropped.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsubscribe_and_drop_remove_listener() {
        let registry: Arc<Registry<u32>> = Registry::new();
        let user = UserId::new();

        let first = registry.add(&user, Arc::new(|_: Vec<u32>| {}));
        let second = registry.add(&user, Arc::new(|_: Vec<u32>| {}));
        assert_eq!(registry.len(), 2);

        first.unsubscribe();
        assert_eq!(registry.len(), 1);

        drop(second);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_listeners_are_scoped_by_user() {
        let registry: Arc<Registry<u32>> = Registry::new();
        let alice = UserId::new();
        let bob = UserId::new();

        let _a = registry.add(&alice, Arc::new(|_: Vec<u32>| {}));
        let _b = registry.add(&bob, Arc::new(|_: Vec<u32>| {}));

        assert_eq!(registry.listeners_for(&alice).len(), 1);
        assert_eq!(registry.listeners_for(&UserId::new()).len(), 0);
    }

    #[test]
    fn test_handle_outliving_registry_is_harmless() {
        let registry: Arc<Registry<u32>> = Registry::new();
        let subscription = registry.add(&UserId::new(), Arc::new(|_: Vec<u32>| {}));
        drop(registry);
        subscription.unsubscribe();
    }
}
