use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};

/// Per-key mutual exclusion, for serializing cache population
///
/// Callers holding the same key run one at a time, callers with different
/// keys never wait on each other. Each key's lock object is reference
/// counted and is dropped from the map by whichever holder finishes last,
/// so the map only ever contains keys that somebody is using or waiting on.
#[derive(Debug)]
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    map: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        KeyedLocks {
            map: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        KeyedLocks::default()
    }

    /// Run `f` while holding the lock for `key`
    ///
    /// The lock is released on every exit from `f`, including unwinding. A
    /// panic in one holder does not poison the key for later callers.
    pub fn with_lock<T, F: FnOnce() -> T>(&self, key: &K, f: F) -> T {
        let release = Release {
            locks: self,
            key,
            entry: Some(self.checkout(key)),
        };
        let _guard = release
            .entry
            .as_ref()
            .map(|entry| entry.lock().unwrap_or_else(PoisonError::into_inner));
        f()
    }

    /// Number of keys currently held or waited on
    pub fn len(&self) -> usize {
        self.map.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn checkout(&self, key: &K) -> Arc<Mutex<()>> {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(key.clone()).or_default().clone()
    }
}

struct Release<'a, K: Eq + Hash + Clone> {
    locks: &'a KeyedLocks<K>,
    key: &'a K,
    entry: Option<Arc<Mutex<()>>>,
}

impl<'a, K: Eq + Hash + Clone> Drop for Release<'a, K> {
    fn drop(&mut self) {
        let mut map = self
            .locks
            .map
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // With our reference gone, anything beyond the map's own is a
        // caller that checked out this key and has yet to finish.
        drop(self.entry.take());
        let idle = match map.get(self.key) {
            Some(entry) => Arc::strong_count(entry) == 1,
            None => false,
        };
        if idle {
            map.remove(self.key);
        }
    }
}
