//! In-memory tier with cost- and count-bounded LRU eviction.
//!
//! Entries live in a `HashMap`; recency is tracked by a monotonically
//! increasing tick stored in a `BTreeMap`, so the least-recently-used entry is
//! always the first key of the recency index. Ticks are unique, which also
//! breaks ties by insertion order.
//!
//! Lookups are an expected O(1) hash probe plus an O(log n) recency update;
//! eviction pops the first recency key in O(log n).
//!
//! Limits are read from the shared [`CacheConfig`] on every `set`, so lowering
//! them at runtime applies on the next insertion (or immediately via
//! [`MemoryCache::trim`]).
//!
//! All state sits behind a single `parking_lot::Mutex`. Critical sections are
//! short and never perform I/O.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::config::CacheConfig;
use super::types::CacheKey;

/// Memory tier statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: usize,
    pub total_cost: u64,
}

impl MemoryStats {
    /// Fraction of lookups that hit, or 0.0 with no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry<I> {
    value: I,
    cost: u64,
    tick: u64,
}

struct Inner<I> {
    entries: HashMap<CacheKey, Entry<I>>,
    recency: BTreeMap<u64, CacheKey>,
    next_tick: u64,
    total_cost: u64,
}

impl<I> Inner<I> {
    fn touch(&mut self, key: &CacheKey) -> Option<&Entry<I>> {
        let tick = self.next_tick;
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        self.recency.insert(tick, key.clone());
        self.next_tick += 1;
        Some(entry)
    }

    fn take(&mut self, key: &CacheKey) -> Option<Entry<I>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        self.total_cost -= entry.cost;
        Some(entry)
    }

    fn over_limit(&self, max_cost: u64, max_count: u64) -> bool {
        (max_cost > 0 && self.total_cost > max_cost)
            || (max_count > 0 && self.entries.len() as u64 > max_count)
    }

    /// Evict from the cold end until both limits hold. Returns evicted count.
    fn evict(&mut self, max_cost: u64, max_count: u64) -> u64 {
        let mut evicted = 0;
        while self.over_limit(max_cost, max_count) {
            let Some((_, key)) = self.recency.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.total_cost -= entry.cost;
                evicted += 1;
            }
        }
        evicted
    }
}

/// Bounded key → decoded image map.
///
/// `I` is the decoded representation; it is cloned out on every hit, so it
/// should be cheap to clone (an `Arc` or `Bytes`).
pub struct MemoryCache<I> {
    inner: Mutex<Inner<I>>,
    config: Arc<CacheConfig>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<I: Clone> MemoryCache<I> {
    /// Create an empty memory tier governed by `config`.
    pub fn new(config: Arc<CacheConfig>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                next_tick: 0,
                total_cost: 0,
            }),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up `key`, marking it most-recently-used on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<I> {
        let mut inner = self.inner.lock();
        match inner.touch(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace `key`, then evict cold entries until the configured
    /// cost and count limits both hold.
    pub fn set(&self, key: CacheKey, value: I, cost: u64) {
        let max_cost = self.config.max_memory_cost();
        let max_count = self.config.max_memory_count();

        let mut inner = self.inner.lock();
        inner.take(&key);

        let tick = inner.next_tick;
        inner.next_tick += 1;
        inner.total_cost += cost;
        inner.recency.insert(tick, key.clone());
        inner.entries.insert(key, Entry { value, cost, tick });

        let evicted = inner.evict(max_cost, max_count);
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
    }

    /// Remove `key` if present. Returns whether an entry was removed.
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.inner.lock().take(key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
        inner.total_cost = 0;
    }

    /// Apply the current limits without inserting anything.
    pub fn trim(&self) {
        let max_cost = self.config.max_memory_cost();
        let max_count = self.config.max_memory_count();
        let evicted = self.inner.lock().evict(max_cost, max_count);
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
    }

    /// Whether `key` is present. Does not affect recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn total_cost(&self) -> u64 {
        self.inner.lock().total_cost
    }

    /// Keys ordered from least to most recently used.
    pub fn keys_by_recency(&self) -> Vec<CacheKey> {
        self.inner.lock().recency.values().cloned().collect()
    }

    pub fn stats(&self) -> MemoryStats {
        let inner = self.inner.lock();
        MemoryStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entry_count: inner.entries.len(),
            total_cost: inner.total_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn cache_with(max_cost: u64, max_count: u64) -> MemoryCache<Vec<u8>> {
        let config = CacheConfig::new()
            .with_max_memory_cost(max_cost)
            .with_max_memory_count(max_count);
        MemoryCache::new(Arc::new(config))
    }

    fn key(n: u32) -> CacheKey {
        CacheKey::new(format!("key-{}", n))
    }

    #[test]
    fn test_memory_cache_set_and_get() {
        let cache = cache_with(0, 0);
        cache.set(key(1), vec![1, 2, 3], 3);

        assert_eq!(cache.get(&key(1)), Some(vec![1, 2, 3]));
        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.total_cost(), 3);
    }

    #[test]
    fn test_memory_cache_miss_has_no_side_effect() {
        let cache = cache_with(0, 0);
        assert_eq!(cache.get(&key(1)), None);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_memory_cache_replace_updates_cost() {
        let cache = cache_with(0, 0);
        cache.set(key(1), vec![0; 10], 10);
        cache.set(key(1), vec![0; 4], 4);

        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.total_cost(), 4);
        assert_eq!(cache.get(&key(1)), Some(vec![0; 4]));
    }

    #[test]
    fn test_memory_cache_evicts_least_recently_used_by_cost() {
        let cache = cache_with(250, 0);
        cache.set(key(1), vec![1], 100);
        cache.set(key(2), vec![2], 100);

        // Touch key 1 so key 2 becomes the coldest entry.
        assert!(cache.get(&key(1)).is_some());

        cache.set(key(3), vec![3], 100);

        assert!(cache.contains(&key(1)));
        assert!(!cache.contains(&key(2)));
        assert!(cache.contains(&key(3)));
        assert!(cache.total_cost() <= 250);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_memory_cache_evicts_by_count() {
        let cache = cache_with(0, 2);
        cache.set(key(1), vec![], 1);
        cache.set(key(2), vec![], 1);
        cache.set(key(3), vec![], 1);

        assert_eq!(cache.keys_by_recency(), vec![key(2), key(3)]);
    }

    #[test]
    fn test_memory_cache_ties_broken_by_insertion_order() {
        let cache = cache_with(0, 3);
        for n in 1..=5 {
            cache.set(key(n), vec![], 0);
        }
        assert_eq!(cache.keys_by_recency(), vec![key(3), key(4), key(5)]);
    }

    #[test]
    fn test_memory_cache_limits_read_at_call_time() {
        let config = Arc::new(CacheConfig::new());
        let cache: MemoryCache<u8> = MemoryCache::new(Arc::clone(&config));
        for n in 0..10 {
            cache.set(key(n), 0, 10);
        }
        assert_eq!(cache.entry_count(), 10);

        config.set_max_memory_cost(30);
        cache.trim();
        assert_eq!(cache.entry_count(), 3);
        assert_eq!(cache.keys_by_recency(), vec![key(7), key(8), key(9)]);
    }

    #[test]
    fn test_memory_cache_remove_and_clear() {
        let cache = cache_with(0, 0);
        cache.set(key(1), vec![1], 1);
        cache.set(key(2), vec![2], 1);

        assert!(cache.remove(&key(1)));
        assert!(!cache.remove(&key(1)));
        assert_eq!(cache.total_cost(), 1);

        cache.clear();
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.total_cost(), 0);
    }

    #[test]
    fn test_memory_cache_stats() {
        let cache = cache_with(0, 0);
        cache.set(key(1), vec![1], 1);
        cache.get(&key(1));
        cache.get(&key(1));
        cache.get(&key(2));

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(u8, u64),
        Get(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16, 0u64..64).prop_map(|(k, c)| Op::Set(k, c)),
            (0u8..16).prop_map(Op::Get),
        ]
    }

    proptest! {
        #[test]
        fn prop_memory_cache_matches_reference_lru(
            ops in prop::collection::vec(op_strategy(), 1..200),
            max_cost in 1u64..200,
            max_count in 0u64..8,
        ) {
            let cache = cache_with(max_cost, max_count);
            let mut model: VecDeque<(u8, u64)> = VecDeque::new();

            for op in ops {
                match op {
                    Op::Set(k, cost) => {
                        cache.set(key(k as u32), vec![k], cost);
                        model.retain(|(mk, _)| *mk != k);
                        model.push_back((k, cost));
                        loop {
                            let total: u64 = model.iter().map(|(_, c)| c).sum();
                            let over_cost = total > max_cost;
                            let over_count = max_count > 0 && model.len() as u64 > max_count;
                            if !(over_cost || over_count) {
                                break;
                            }
                            model.pop_front();
                        }
                    }
                    Op::Get(k) => {
                        let hit = cache.get(&key(k as u32)).is_some();
                        let pos = model.iter().position(|(mk, _)| *mk == k);
                        prop_assert_eq!(hit, pos.is_some());
                        if let Some(pos) = pos {
                            if let Some(entry) = model.remove(pos) {
                                model.push_back(entry);
                            }
                        }
                    }
                }

                prop_assert!(cache.total_cost() <= max_cost);
            }

            let expected: Vec<CacheKey> = model.iter().map(|(k, _)| key(*k as u32)).collect();
            prop_assert_eq!(cache.keys_by_recency(), expected);
        }
    }
}
