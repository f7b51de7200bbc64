use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// The Store is responsible for managing key-value pairs. The store is designed to be
/// thread-safe, allowing it to be shared and cloned cheaply using reference counting.
///
/// Locking is whole-map: readers run in parallel, while `set` and `delete` take the write
/// lock exclusively, so no reader ever observes a half-applied mutation.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<HashMap<Key, Entry>>>,
}

/// Keys are binary-safe, like values.
type Key = Bytes;

/// The stored form of a value.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub data: Bytes,
}

impl Store {
    pub fn new() -> Store {
        Self::default()
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<Bytes> {
        self.inner
            .read()
            .get(key.as_ref())
            .map(|entry| entry.data.clone())
    }

    /// Inserts `data` under `key`, overwriting any previous value.
    pub fn set(&self, key: impl Into<Key>, data: Bytes) {
        self.inner.write().insert(key.into(), Entry { data });
    }

    /// Removes every key in `keys` that is present and returns how many were removed. The
    /// whole batch runs under a single write lock.
    pub fn delete<K: AsRef<[u8]>>(&self, keys: &[K]) -> usize {
        let mut map = self.inner.write();
        keys.iter()
            .map(|key| key.as_ref())
            .filter(|key: &&[u8]| map.remove(*key).is_some())
            .count()
    }

    pub fn exists(&self, key: impl AsRef<[u8]>) -> bool {
        self.inner.read().contains_key(key.as_ref())
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of every key-value pair, for comparing store states.
    pub fn snapshot(&self) -> HashMap<Key, Bytes> {
        self.inner
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.data.clone()))
            .collect()
    }
}
