//! Specialized collection types

use std::collections::HashMap;
use std::hash::Hash;

pub use slotmap::{SlotMap, SecondaryMap};

/// Dense, stable-array pool with O(1) insert and swap-remove
///
/// Items stay packed in a `Vec` for bulk iteration; a side index maps each
/// key to its current position. When spare capacity drops below `margin`
/// the backing storage doubles.
#[derive(Debug, Clone)]
pub struct DensePool<K, V> {
    items: Vec<V>,
    keys: Vec<K>,
    index: HashMap<K, usize>,
    margin: usize,
}

impl<K: Copy + Eq + Hash, V> DensePool<K, V> {
    /// Create a pool with an initial capacity and growth margin
    pub fn new(capacity: usize, margin: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            margin,
        }
    }

    /// Insert an item; returns false if the key is already present
    pub fn insert(&mut self, key: K, value: V) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }

        self.reserve_headroom();
        self.index.insert(key, self.items.len());
        self.items.push(value);
        self.keys.push(key);
        true
    }

    /// Remove an item by key, moving the last item into its slot
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let position = self.index.remove(key)?;
        let value = self.items.swap_remove(position);
        self.keys.swap_remove(position);

        if let Some(moved) = self.keys.get(position) {
            self.index.insert(*moved, position);
        }
        Some(value)
    }

    /// Get an item by key
    pub fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&position| &self.items[position])
    }

    /// Check whether a key is present
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Packed slice of all items
    pub fn as_slice(&self) -> &[V] {
        &self.items
    }

    /// Iterate items in storage order
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.items.iter()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current allocated capacity
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    fn reserve_headroom(&mut self) {
        let headroom = self.items.capacity() - self.items.len();
        if headroom > self.margin {
            return;
        }

        let target = (self.items.capacity() * 2).max(self.items.len() + self.margin + 1);
        let additional = target - self.items.len();
        log::debug!(
            "Growing dense pool from {} to {} slots",
            self.items.capacity(),
            target
        );
        self.items.reserve(additional);
        self.keys.reserve(additional);
        self.index.reserve(additional);
    }
}

impl<K: Copy + Eq + Hash, V: Clone> DensePool<K, V> {
    /// Copy the current contents into a shared snapshot for worker fan-out
    pub fn snapshot(&self) -> std::sync::Arc<[V]> {
        self.items.iter().cloned().collect()
    }
}

impl<K: Copy + Eq + Hash, V> Default for DensePool<K, V> {
    fn default() -> Self {
        Self::new(0, 0)
    }
}
