use std::{
    any::Any,
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

type CachedValue = Box<dyn Any + Send + Sync>;

/// Decoded values for one snapshot, keyed by path and decoded type.
///
/// A path usually has one cached type, so each path holds a short list
/// instead of a nested map. Reads hand out clones; writes store the value
/// they are given and never replace an existing entry of the same type.
#[derive(Default)]
pub struct ValueCache {
    values: RwLock<HashMap<String, Vec<CachedValue>>>,
}

impl ValueCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the `T` cached for `path`, if any.
    pub fn get<T>(&self, path: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);

        values
            .get(path)?
            .iter()
            .find_map(|cached| cached.downcast_ref::<T>())
            .cloned()
    }

    /// Caches `value` for `path` unless a `T` is already cached there.
    pub fn set<T>(&self, path: &str, value: T)
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        let cached = values.entry(path.to_string()).or_default();

        if cached.iter().any(|existing| existing.is::<T>()) {
            return;
        }

        cached.push(Box::new(value));
    }

    /// Number of cached (path, type) entries.
    pub fn len(&self) -> usize {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.values().map(Vec::len).sum()
    }

    /// Returns true if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
