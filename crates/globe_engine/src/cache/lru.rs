//! Generic capacity-bounded LRU cache
//!
//! Maps an opaque key to a value plus a byte cost and evicts least recently
//! used entries down to a low-water mark when the capacity is exceeded. The
//! cache knows nothing about GPU objects or I/O; destruction semantics belong
//! to the layer that owns it (see `cache::resource_cache`), which receives
//! every evicted entry exactly once through [`PutResult`].

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

struct CacheSlot<V> {
    value: V,
    cost: usize,
}

/// The outcome of a [`KeyedLruCache::put`].
#[derive(Debug)]
pub struct PutResult<K, V> {
    /// The value previously stored under the same key, if any.
    pub previous: Option<V>,
    /// Entries evicted to satisfy the capacity constraint, least recently
    /// used first. Each evicted entry is surfaced here exactly once; the
    /// caller decides what destruction means.
    pub evicted: Vec<(K, V)>,
}

/// Capacity-bounded cache with least-recently-used eviction.
///
/// Single-threaded by design: the render thread owns it, and the async
/// machinery hands results over via queues rather than sharing the map.
pub struct KeyedLruCache<K, V> {
    slots: HashMap<K, CacheSlot<V>>,
    /// Recency order, least recently used at the front. Entries that have
    /// never been touched remain in insertion order, which gives the
    /// oldest-inserted-first tie break.
    recency: VecDeque<K>,
    capacity: usize,
    low_water: usize,
    used_cost: usize,
}

impl<K: Eq + Hash + Clone, V> KeyedLruCache<K, V> {
    /// Create a cache with the given capacity and low-water mark, in cost
    /// units (bytes for GPU resources).
    ///
    /// # Panics
    /// Panics unless `0 < low_water < capacity`.
    pub fn new(capacity: usize, low_water: usize) -> Self {
        assert!(
            low_water > 0 && low_water < capacity,
            "cache low-water mark must satisfy 0 < low_water < capacity"
        );
        Self {
            slots: HashMap::new(),
            recency: VecDeque::new(),
            capacity,
            low_water,
            used_cost: 0,
        }
    }

    /// Look up a value, marking it most recently used. Read-through only:
    /// a miss never creates anything.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.slots.contains_key(key) {
            self.touch(key);
        }
        self.slots.get(key).map(|slot| &slot.value)
    }

    /// Mutable lookup, marking the entry most recently used.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.slots.contains_key(key) {
            self.touch(key);
        }
        self.slots.get_mut(key).map(|slot| &mut slot.value)
    }

    /// Whether a key is present, without updating recency.
    pub fn contains(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Insert a value with its cost, marking it most recently used.
    ///
    /// If the resulting used cost exceeds the capacity, least recently used
    /// entries are evicted until the used cost drops to the low-water mark or
    /// only the just-inserted entry remains. The cache never evicts the entry
    /// it was just asked to hold: a single entry costing more than the whole
    /// capacity is retained and logged as an anomaly.
    pub fn put(&mut self, key: K, value: V, cost: usize) -> PutResult<K, V> {
        let previous = match self.slots.remove(&key) {
            Some(old) => {
                self.used_cost -= old.cost;
                self.remove_from_recency(&key);
                Some(old.value)
            }
            None => None,
        };

        self.used_cost += cost;
        self.slots.insert(key.clone(), CacheSlot { value, cost });
        self.recency.push_back(key);

        let mut evicted = Vec::new();
        if self.used_cost > self.capacity {
            // The just-inserted key sits at the back of the recency queue, so
            // the front is always a different entry while len > 1.
            while self.used_cost > self.low_water && self.slots.len() > 1 {
                match self.recency.pop_front() {
                    Some(victim_key) => {
                        if let Some(victim) = self.slots.remove(&victim_key) {
                            self.used_cost -= victim.cost;
                            evicted.push((victim_key, victim.value));
                        }
                    }
                    None => break,
                }
            }
            if self.used_cost > self.capacity {
                log::warn!(
                    "Single cache entry exceeds capacity ({} > {} cost units); retaining it",
                    self.used_cost,
                    self.capacity
                );
            }
        }

        PutResult { previous, evicted }
    }

    /// Remove an entry, transferring ownership of the value to the caller.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        match self.slots.remove(key) {
            Some(slot) => {
                self.used_cost -= slot.cost;
                self.remove_from_recency(key);
                Some(slot.value)
            }
            None => None,
        }
    }

    /// Drop every entry without surfacing evictions, resetting the used cost
    /// to zero. This is the context-loss path: the values are destroyed in
    /// place, never handed anywhere.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.recency.clear();
        self.used_cost = 0;
    }

    /// Sum of the costs of all resident entries.
    pub fn used_cost(&self) -> usize {
        self.used_cost
    }

    /// The configured capacity in cost units.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The configured low-water mark in cost units.
    pub fn low_water(&self) -> usize {
        self.low_water
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Move a key to the back of the recency queue (most recently used).
    fn touch(&mut self, key: &K) {
        self.remove_from_recency(key);
        self.recency.push_back(key.clone());
    }

    fn remove_from_recency(&mut self, key: &K) {
        self.recency.retain(|k| k != key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize, low_water: usize) -> KeyedLruCache<&'static str, u32> {
        KeyedLruCache::new(capacity, low_water)
    }

    #[test]
    fn test_put_get_round_trip() {
        let mut c = cache(10, 5);
        let result = c.put("a", 1, 2);
        assert!(result.previous.is_none());
        assert!(result.evicted.is_empty());
        assert_eq!(c.get(&"a"), Some(&1));
        assert_eq!(c.get(&"b"), None);
        assert_eq!(c.used_cost(), 2);
    }

    #[test]
    fn test_put_returns_previous_value() {
        let mut c = cache(10, 5);
        c.put("a", 1, 2);
        let result = c.put("a", 2, 3);
        assert_eq!(result.previous, Some(1));
        assert_eq!(c.len(), 1);
        assert_eq!(c.used_cost(), 3);
    }

    #[test]
    fn test_capacity_invariant_after_put() {
        let mut c = cache(8, 4);
        for (key, cost) in [("a", 3), ("b", 3), ("c", 3), ("d", 2), ("e", 3)] {
            c.put(key, 0, cost);
            assert!(
                c.used_cost() <= c.capacity(),
                "used cost {} exceeds capacity after putting {key}",
                c.used_cost()
            );
        }
    }

    #[test]
    fn test_eviction_drains_to_low_water() {
        let mut c = cache(6, 2);
        c.put("a", 0, 2);
        c.put("b", 0, 2);
        c.put("c", 0, 2);
        assert_eq!(c.used_cost(), 6); // at capacity, no eviction yet

        let result = c.put("d", 0, 2);
        // 8 > 6 triggers eviction down to <= 2: a, b, and c all go.
        let keys: Vec<_> = result.evicted.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(c.used_cost(), 2);
        assert!(c.contains(&"d"));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut c = cache(3, 2);
        c.put("a", 0, 1);
        c.put("b", 0, 1);
        c.put("c", 0, 1);
        // Touch "a": "b" becomes the least recently used entry.
        c.get(&"a");

        let result = c.put("d", 0, 1);
        let keys: Vec<_> = result.evicted.iter().map(|(k, _)| *k).collect();
        assert!(keys.contains(&"b"), "expected b to be evicted, got {keys:?}");
        assert!(!keys.contains(&"a"), "a was refreshed and must survive");
    }

    #[test]
    fn test_untouched_entries_evict_in_insertion_order() {
        let mut c = cache(2, 1);
        c.put("first", 0, 1);
        c.put("second", 0, 1);
        let result = c.put("third", 0, 1);
        let keys: Vec<_> = result.evicted.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["first", "second"]);
    }

    #[test]
    fn test_oversized_entry_is_retained_alone() {
        let mut c = cache(10, 5);
        c.put("small", 0, 2);
        let result = c.put("huge", 0, 50);
        // Everything else is evicted, but never the entry just inserted.
        assert_eq!(result.evicted.len(), 1);
        assert_eq!(result.evicted[0].0, "small");
        assert_eq!(c.len(), 1);
        assert!(c.contains(&"huge"));
        assert_eq!(c.used_cost(), 50);
    }

    #[test]
    fn test_remove_transfers_ownership() {
        let mut c = cache(10, 5);
        c.put("a", 7, 3);
        assert_eq!(c.remove(&"a"), Some(7));
        assert_eq!(c.remove(&"a"), None);
        assert_eq!(c.used_cost(), 0);
        assert!(c.is_empty());
    }

    #[test]
    fn test_clear_resets_without_evictions() {
        let mut c = cache(10, 5);
        c.put("a", 0, 3);
        c.put("b", 0, 3);
        c.clear();
        assert!(c.is_empty());
        assert_eq!(c.used_cost(), 0);
        // The cache is fully usable afterwards.
        let result = c.put("c", 0, 3);
        assert!(result.evicted.is_empty());
    }

    #[test]
    fn test_reinsert_after_eviction() {
        let mut c = cache(2, 1);
        c.put("a", 1, 1);
        c.put("b", 2, 1);
        c.put("c", 3, 1); // evicts a and b
        assert!(!c.contains(&"a"));
        c.put("a", 4, 1);
        assert_eq!(c.get(&"a"), Some(&4));
    }

    #[test]
    #[should_panic(expected = "low_water")]
    fn test_invalid_watermarks_rejected() {
        let _ = cache(4, 4);
    }
}
