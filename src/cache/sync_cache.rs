use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Condvar, Mutex, PoisonError},
};

enum Outcome<V> {
    Stored(V),
    Abandoned,
}

/// Completion signal for one in-flight load.
struct Pending<V> {
    outcome: Mutex<Option<Outcome<V>>>,
    done: Condvar,
}

impl<V: Clone> Pending<V> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn finish(&self, outcome: Outcome<V>) {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(outcome);
        self.done.notify_all();
    }

    /// Blocks until the loader finishes; `None` if it gave up.
    fn wait(&self) -> Option<V> {
        let mut slot = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        while slot.is_none() {
            slot = self.done.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }

        match slot.as_ref() {
            Some(Outcome::Stored(value)) => Some(value.clone()),
            _ => None,
        }
    }
}

enum Slot<V> {
    Loading(Arc<Pending<V>>),
    Ready(V),
}

/// Result of [`SyncCache::load`].
pub enum Load<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// The value was cached, or another caller finished loading it.
    Ready(V),
    /// This caller must load the value and hand it to [`LoadGuard::store`].
    Vacant(LoadGuard<'a, K, V>),
}

/// A concurrent map with stampede protection.
///
/// The first caller to [`load`](SyncCache::load) a missing key becomes its
/// loader; every concurrent caller for the same key blocks until the loader
/// stores a value. Entries are never invalidated.
///
/// A loader that drops its guard without storing withdraws the pending
/// marker. Its waiters wake up and retry, so one of them becomes the next
/// loader; failures are not cached.
pub struct SyncCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> Default for SyncCache<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SyncCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value or makes the caller responsible for loading it.
    pub fn load(&self, key: K) -> Load<'_, K, V> {
        loop {
            let pending = {
                let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

                match slots.get(&key) {
                    Some(Slot::Ready(value)) => return Load::Ready(value.clone()),
                    Some(Slot::Loading(pending)) => Arc::clone(pending),
                    None => {
                        let pending = Arc::new(Pending::new());
                        slots.insert(key.clone(), Slot::Loading(Arc::clone(&pending)));

                        return Load::Vacant(LoadGuard {
                            cache: self,
                            key,
                            pending,
                            stored: false,
                        });
                    }
                }
            };

            if let Some(value) = pending.wait() {
                return Load::Ready(value);
            }
        }
    }

    /// Returns the value for `key` without ever becoming its loader.
    ///
    /// An in-flight load is waited for rather than reported as a miss.
    pub fn load_only(&self, key: &K) -> Option<V> {
        let pending = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

            match slots.get(key)? {
                Slot::Ready(value) => return Some(value.clone()),
                Slot::Loading(pending) => Arc::clone(pending),
            }
        };

        pending.wait()
    }

    /// Number of keys with a stored value.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Returns true if no value has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Obligation to load one key, handed to the first caller of
/// [`SyncCache::load`].
pub struct LoadGuard<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    cache: &'a SyncCache<K, V>,
    key: K,
    pending: Arc<Pending<V>>,
    stored: bool,
}

impl<K, V> LoadGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// The key being loaded.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Publishes `value` and releases every waiter.
    pub fn store(mut self, value: V) {
        {
            let mut slots = self
                .cache
                .slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            slots.insert(self.key.clone(), Slot::Ready(value.clone()));
        }

        self.pending.finish(Outcome::Stored(value));
        self.stored = true;
    }
}

impl<K, V> Drop for LoadGuard<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if self.stored {
            return;
        }

        {
            let mut slots = self
                .cache
                .slots
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            let ours = matches!(
                slots.get(&self.key),
                Some(Slot::Loading(pending)) if Arc::ptr_eq(pending, &self.pending)
            );
            if ours {
                slots.remove(&self.key);
            }
        }

        self.pending.finish(Outcome::Abandoned);
    }
}
