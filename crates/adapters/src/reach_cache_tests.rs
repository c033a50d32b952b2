// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn caches_within_ttl() {
    let cache = ReachCache::new(8, Duration::from_secs(60));
    assert_eq!(cache.get("http://127.0.0.1:9222"), None);
    cache.put("http://127.0.0.1:9222", true);
    assert_eq!(cache.get("http://127.0.0.1:9222"), Some(true));
}

#[test]
fn expired_entries_are_dropped() {
    let cache = ReachCache::new(8, Duration::from_millis(0));
    cache.put("http://127.0.0.1:9222", true);
    assert_eq!(cache.get("http://127.0.0.1:9222"), None);
}

#[test]
fn capacity_evicts_least_recently_used() {
    let cache = ReachCache::new(2, Duration::from_secs(60));
    cache.put("a", true);
    cache.put("b", false);
    cache.put("c", true);
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b"), Some(false));
    assert_eq!(cache.get("c"), Some(true));
}

#[test]
fn invalidate_removes_entry() {
    let cache = ReachCache::default();
    cache.put("a", true);
    cache.invalidate("a");
    assert_eq!(cache.get("a"), None);
}
