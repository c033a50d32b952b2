// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded reachability cache.
//!
//! Probe results are cached per origin with a TTL so bursts of commands
//! against the same session do not stampede the endpoint. Capacity is
//! fixed; eviction is LRU.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

pub const DEFAULT_REACH_CACHE_CAPACITY: usize = 256;
pub const DEFAULT_REACH_CACHE_TTL: Duration = Duration::from_millis(1500);

struct Entry {
    reachable: bool,
    at: Instant,
}

/// Concurrent-read-safe probe cache.
pub struct ReachCache {
    inner: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
}

impl ReachCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fresh cached result for an origin, if any.
    pub fn get(&self, origin: &str) -> Option<bool> {
        let mut cache = self.inner.lock();
        match cache.get(origin) {
            Some(entry) if entry.at.elapsed() < self.ttl => Some(entry.reachable),
            Some(_) => {
                cache.pop(origin);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, origin: &str, reachable: bool) {
        self.inner.lock().put(
            origin.to_string(),
            Entry {
                reachable,
                at: Instant::now(),
            },
        );
    }

    /// Drop a cached result, e.g. after relaunching a browser.
    pub fn invalidate(&self, origin: &str) {
        self.inner.lock().pop(origin);
    }
}

impl Default for ReachCache {
    fn default() -> Self {
        Self::new(DEFAULT_REACH_CACHE_CAPACITY, DEFAULT_REACH_CACHE_TTL)
    }
}

#[cfg(test)]
#[path = "reach_cache_tests.rs"]
mod tests;
