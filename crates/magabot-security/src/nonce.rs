//! Single-use nonce registry for replay protection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Remembers recently seen nonces.
///
/// A nonce is accepted at most once within its TTL. The cache is bounded
/// independently of the TTL: past `max_entries`, the oldest entries are
/// evicted so a hostile client cannot exhaust memory with unique nonces.
pub struct NonceCache {
    ttl: Duration,
    max_entries: usize,
    seen: Mutex<HashMap<String, Instant>>,
}

impl NonceCache {
    /// Create a cache with the given TTL and size bound.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record `nonce` if it is fresh.
    ///
    /// Returns `true` when the nonce was unseen (now recorded) and `false`
    /// when it was already used within the TTL.
    pub fn check_and_insert(&self, nonce: &str) -> bool {
        let now = Instant::now();
        let mut guard = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        guard.retain(|_, t| now.duration_since(*t) < self.ttl);

        if guard.contains_key(nonce) {
            return false;
        }

        // Size bound: evict oldest entries until there is room.
        while guard.len() >= self.max_entries {
            let Some(oldest) = guard
                .iter()
                .min_by_key(|(_, t)| **t)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            guard.remove(&oldest);
        }

        guard.insert(nonce.to_string(), now);
        true
    }

    /// Number of currently remembered nonces.
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_use_accepted_replay_rejected() {
        let cache = NonceCache::new(Duration::from_secs(60), 100);
        assert!(cache.check_and_insert("n1"));
        assert!(!cache.check_and_insert("n1"));
    }

    #[test]
    fn distinct_nonces_accepted() {
        let cache = NonceCache::new(Duration::from_secs(60), 100);
        assert!(cache.check_and_insert("n1"));
        assert!(cache.check_and_insert("n2"));
    }

    #[test]
    fn expired_nonce_reusable() {
        let cache = NonceCache::new(Duration::from_millis(20), 100);
        assert!(cache.check_and_insert("n1"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.check_and_insert("n1"));
    }

    #[test]
    fn size_bound_evicts_oldest() {
        let cache = NonceCache::new(Duration::from_secs(60), 3);
        assert!(cache.check_and_insert("a"));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.check_and_insert("b"));
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.check_and_insert("c"));
        std::thread::sleep(Duration::from_millis(2));
        // Cache full; inserting a fourth evicts "a".
        assert!(cache.check_and_insert("d"));
        assert_eq!(cache.len(), 3);
        // "a" was evicted, so it reads as fresh again.
        assert!(cache.check_and_insert("a"));
        // "d" is still remembered.
        assert!(!cache.check_and_insert("d"));
    }

    #[test]
    fn zero_bound_clamped_to_one() {
        let cache = NonceCache::new(Duration::from_secs(60), 0);
        assert!(cache.check_and_insert("a"));
        assert!(!cache.check_and_insert("a"));
    }
}
