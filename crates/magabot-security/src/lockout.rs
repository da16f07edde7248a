//! Auth-failure counting with temporary lockout.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tracks authentication failures per client key (typically an IP).
///
/// Once `max_failures` failures accumulate inside the lockout horizon the
/// key is locked and every request from it is refused until the horizon
/// passes. A successful authentication clears the key's history.
pub struct FailureTracker {
    max_failures: usize,
    lockout: Duration,
    failures: Mutex<HashMap<String, Vec<Instant>>>,
}

impl FailureTracker {
    /// Create a tracker locking after `max_failures` within `lockout`.
    pub fn new(max_failures: usize, lockout: Duration) -> Self {
        Self {
            max_failures,
            lockout,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Record one failure for `key`.
    pub fn record_failure(&self, key: &str) {
        let now = Instant::now();
        let mut guard = self
            .failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let stamps = guard.entry(key.to_string()).or_default();
        stamps.retain(|t| now.duration_since(*t) < self.lockout);
        stamps.push(now);
    }

    /// Remaining lockout for `key`, if it is currently locked.
    pub fn is_locked(&self, key: &str) -> Option<Duration> {
        if self.max_failures == 0 {
            return None;
        }
        let now = Instant::now();
        let mut guard = self
            .failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let stamps = guard.get_mut(key)?;
        stamps.retain(|t| now.duration_since(*t) < self.lockout);
        if stamps.len() < self.max_failures {
            return None;
        }
        stamps
            .iter()
            .min()
            .map(|oldest| self.lockout.saturating_sub(now.duration_since(*oldest)))
    }

    /// Clear the failure history for `key` (called on successful auth).
    pub fn clear(&self, key: &str) {
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
    }
}
