//! Bounded LRU used by the file-system manager to pool open read handles.
//!
//! A plain map plus a recency list; capacities are small (tens of handles),
//! so the O(capacity) touch on the list is irrelevant next to the `open(2)`
//! it saves.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

pub struct LruCache<K, V> {
    map: HashMap<K, V>,
    /// Most recently used at the front.
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            map: HashMap::with_capacity(capacity + 1),
            order: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Returns the cached value for `key`, creating (and possibly evicting
    /// the least-recently-used entry) on a miss. The hit or fresh entry
    /// becomes the most recently used.
    pub fn get_or_insert_with<E, F>(&mut self, key: &K, create: F) -> Result<&mut V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if self.map.contains_key(key) {
            self.touch(key);
        } else {
            let value = create(key)?;
            self.map.insert(key.clone(), value);
            self.order.push_front(key.clone());
            if self.map.len() > self.capacity {
                if let Some(oldest) = self.order.pop_back() {
                    self.map.remove(&oldest);
                }
            }
        }
        Ok(self
            .map
            .get_mut(key)
            .expect("entry present after insert or touch"))
    }

    /// Drops `key`'s entry if cached.
    pub fn remove(&mut self, key: &K) {
        if self.map.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            let k = self.order.remove(pos).expect("position just found");
            self.order.push_front(k);
        }
    }
}
