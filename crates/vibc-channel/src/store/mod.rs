//! Logical key/value store the channel registry persists into.
//!
//! The authenticated store and its commitment root live outside this crate;
//! all the registry needs is byte-keyed get/set plus a write overlay so a
//! message can be applied atomically.

use std::collections::BTreeMap;

pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: &[u8], value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }
}

/// Plain in-memory store, ordered so iteration and dumps are deterministic.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys currently stored, rendered as UTF-8 where possible.
    pub fn keys(&self) -> Vec<String> {
        self.entries
            .keys()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .collect()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.entries.insert(key.to_vec(), value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }
}

/// Write-buffering overlay over a parent store.
///
/// Reads see pending writes first. Nothing reaches the parent until
/// [`CacheStore::commit`]; dropping the overlay discards every write.
pub struct CacheStore<'a> {
    parent: &'a mut dyn KvStore,
    // None marks a pending delete
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> CacheStore<'a> {
    pub fn new(parent: &'a mut dyn KvStore) -> Self {
        Self {
            parent,
            pending: BTreeMap::new(),
        }
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    pub fn commit(self) {
        let CacheStore { parent, pending } = self;
        for (key, value) in pending {
            match value {
                Some(value) => parent.set(&key, value),
                None => parent.delete(&key),
            }
        }
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.get(key) {
            Some(value) => value.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.pending.insert(key.to_vec(), Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.pending.insert(key.to_vec(), None);
    }
}
