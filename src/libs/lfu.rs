//! A small least-frequently-used cache.

use std::collections::HashMap;
use std::hash::Hash;

/// Bounded map that evicts the entry with the fewest hits when full.
///
/// Ties are broken arbitrarily. Inserting counts as the first hit.
#[derive(Debug)]
pub struct LfuCache<K, V> {
    capacity: usize,
    entries: HashMap<K, (V, u64)>,
}

impl<K: Eq + Hash + Clone, V: Clone> LfuCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    /// Returns a clone of the cached value and counts the hit.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.entries.get_mut(key).map(|(value, hits)| {
            *hits += 1;
            value.clone()
        })
    }

    pub fn insert(&mut self, key: K, value: V) {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.0 = value;
            entry.1 += 1;
            return;
        }
        if self.entries.len() >= self.capacity {
            let coldest = self
                .entries
                .iter()
                .min_by_key(|(_, (_, hits))| *hits)
                .map(|(key, _)| key.clone());
            if let Some(coldest) = coldest {
                self.entries.remove(&coldest);
            }
        }
        self.entries.insert(key, (value, 1));
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

