// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use lru::LruCache;
use parking_lot::Mutex;
use std::{hash::Hash, num::NonZeroUsize, sync::Arc};

/// Expiry marker for entries backed exclusively by stable rows; such entries only leave the
/// cache through LRU eviction.
pub const NEVER_EXPIRES: i64 = i64::MAX;

/// A bounded LRU whose entries carry an absolute expiry in unix seconds. Values are shared
/// immutably with all callers.
pub struct FreshnessCache<K, V> {
    entries: Mutex<LruCache<K, Entry<V>>>,
}

struct Entry<V> {
    expires_at: i64,
    value: Arc<V>,
}

impl<K, V> FreshnessCache<K, V>
where
    K: Hash + Eq,
{
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The value for `key` if its entry has not expired at `now`. An expired entry stays in
    /// place until overwritten by the next insert.
    pub fn get(&self, key: &K, now: i64) -> Option<Arc<V>> {
        let mut entries = self.entries.lock();

        entries
            .get(key)
            .filter(|entry| now <= entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: Arc<V>, expires_at: i64) {
        self.entries.lock().put(key, Entry { expires_at, value });
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::cache::{FreshnessCache, NEVER_EXPIRES};
    use std::{num::NonZeroUsize, sync::Arc};

    #[test]
    fn test_short_lived_entry_expires() {
        let cache = FreshnessCache::new(NonZeroUsize::new(4).unwrap());

        // Cached at t=0 with a one second TTL.
        cache.insert(42u64, Arc::new("unstable"), 1);

        // Hit within the TTL returns the very same value.
        let hit = cache.get(&42, 0).unwrap();
        assert!(Arc::ptr_eq(&hit, &cache.get(&42, 1).unwrap()));

        // Expired afterwards.
        assert!(cache.get(&42, 2).is_none());
    }

    #[test]
    fn test_permanent_entry_survives() {
        let cache = FreshnessCache::new(NonZeroUsize::new(4).unwrap());

        cache.insert(42u64, Arc::new("stable"), NEVER_EXPIRES);

        // Still served far in the future without an intervening write.
        let first = cache.get(&42, 0).unwrap();
        let second = cache.get(&42, 10).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_insert_overwrites() {
        let cache = FreshnessCache::new(NonZeroUsize::new(4).unwrap());

        cache.insert(42u64, Arc::new("old"), 1);
        cache.insert(42u64, Arc::new("new"), NEVER_EXPIRES);

        assert_eq!(*cache.get(&42, 100).unwrap(), "new");
    }

    #[test]
    fn test_capacity_is_bounded() {
        let cache = FreshnessCache::new(NonZeroUsize::new(2).unwrap());

        cache.insert(1u64, Arc::new(()), NEVER_EXPIRES);
        cache.insert(2u64, Arc::new(()), NEVER_EXPIRES);
        cache.insert(3u64, Arc::new(()), NEVER_EXPIRES);

        // The least recently used entry is gone.
        assert!(cache.get(&1, 0).is_none());
        assert!(cache.get(&2, 0).is_some());
        assert!(cache.get(&3, 0).is_some());
    }
}
