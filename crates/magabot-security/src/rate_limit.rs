//! Sliding-window rate limiting.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How many checks pass between opportunistic sweeps of stale buckets.
const SWEEP_INTERVAL: u64 = 200;

/// Per-key event timestamps for the two budgets.
#[derive(Default)]
struct Bucket {
    messages: Vec<Instant>,
    commands: Vec<Instant>,
}

impl Bucket {
    fn newest(&self) -> Option<Instant> {
        self.messages.iter().chain(&self.commands).max().copied()
    }
}

struct Inner {
    buckets: HashMap<String, Bucket>,
    checks: u64,
}

/// Dual sliding-window rate limiter.
///
/// Each key carries independent message and command windows over the same
/// horizon. A denied check records nothing, so a flooding client does not
/// extend its own penalty. A cap of zero disables that budget entirely.
pub struct RateLimiter {
    message_cap: usize,
    command_cap: usize,
    window: Duration,
    inner: Mutex<Inner>,
}

impl RateLimiter {
    /// Create a limiter with per-minute caps.
    pub fn new(message_cap: usize, command_cap: usize, window: Duration) -> Self {
        Self {
            message_cap,
            command_cap,
            window,
            inner: Mutex::new(Inner {
                buckets: HashMap::new(),
                checks: 0,
            }),
        }
    }

    /// Check and record a message event for `key`.
    ///
    /// Returns `false` (and records nothing) when the window is full.
    pub fn allow_message(&self, key: &str) -> bool {
        self.allow(key, false)
    }

    /// Check and record a command event for `key`.
    pub fn allow_command(&self, key: &str) -> bool {
        self.allow(key, true)
    }

    /// Time until the oldest in-window message stamp for `key` expires.
    ///
    /// Zero when the key has capacity right now.
    pub fn retry_after(&self, key: &str) -> Duration {
        let now = Instant::now();
        let guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(bucket) = guard.buckets.get(key) else {
            return Duration::ZERO;
        };
        let in_window: Vec<&Instant> = bucket
            .messages
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .collect();
        if self.message_cap == 0 || in_window.len() < self.message_cap {
            return Duration::ZERO;
        }
        in_window
            .iter()
            .min()
            .map(|oldest| self.window.saturating_sub(now.duration_since(**oldest)))
            .unwrap_or(Duration::ZERO)
    }

    /// Drop every bucket whose newest stamp is older than twice the window.
    pub fn sweep(&self) {
        let now = Instant::now();
        let horizon = self.window * 2;
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .buckets
            .retain(|_, b| b.newest().is_some_and(|t| now.duration_since(t) < horizon));
    }

    fn allow(&self, key: &str, command: bool) -> bool {
        let cap = if command {
            self.command_cap
        } else {
            self.message_cap
        };
        // Zero cap means the budget is disabled.
        if cap == 0 {
            return true;
        }

        let now = Instant::now();
        let window = self.window;
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        guard.checks = guard.checks.wrapping_add(1);
        let due_sweep = guard.checks % SWEEP_INTERVAL == 0;
        if due_sweep {
            let horizon = window * 2;
            guard
                .buckets
                .retain(|_, b| b.newest().is_some_and(|t| now.duration_since(t) < horizon));
        }

        let bucket = guard.buckets.entry(key.to_string()).or_default();
        let stamps = if command {
            &mut bucket.commands
        } else {
            &mut bucket.messages
        };

        stamps.retain(|t| now.duration_since(*t) < window);
        if stamps.len() >= cap {
            return false;
        }
        stamps.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_enforced_within_window() {
        let rl = RateLimiter::new(2, 0, Duration::from_secs(60));
        assert!(rl.allow_message("u"));
        assert!(rl.allow_message("u"));
        assert!(!rl.allow_message("u"));
    }

    #[test]
    fn denied_check_records_nothing() {
        let rl = RateLimiter::new(1, 0, Duration::from_millis(40));
        assert!(rl.allow_message("u"));
        // Hammer while full; none of these may extend the window.
        for _ in 0..20 {
            assert!(!rl.allow_message("u"));
        }
        std::thread::sleep(Duration::from_millis(50));
        assert!(rl.allow_message("u"));
    }

    #[test]
    fn window_recovery() {
        let rl = RateLimiter::new(2, 0, Duration::from_millis(50));
        assert!(rl.allow_message("u"));
        assert!(rl.allow_message("u"));
        assert!(!rl.allow_message("u"));
        std::thread::sleep(Duration::from_millis(60));
        assert!(rl.allow_message("u"));
    }

    #[test]
    fn budgets_are_independent() {
        let rl = RateLimiter::new(1, 1, Duration::from_secs(60));
        assert!(rl.allow_message("u"));
        assert!(rl.allow_command("u"));
        assert!(!rl.allow_message("u"));
        assert!(!rl.allow_command("u"));
    }

    #[test]
    fn keys_are_independent() {
        let rl = RateLimiter::new(1, 0, Duration::from_secs(60));
        assert!(rl.allow_message("a"));
        assert!(rl.allow_message("b"));
        assert!(!rl.allow_message("a"));
    }

    #[test]
    fn zero_cap_allows_all() {
        let rl = RateLimiter::new(0, 0, Duration::from_secs(60));
        for _ in 0..1000 {
            assert!(rl.allow_message("u"));
            assert!(rl.allow_command("u"));
        }
    }

    #[test]
    fn retry_after_positive_when_full() {
        let rl = RateLimiter::new(1, 0, Duration::from_secs(60));
        assert!(rl.allow_message("u"));
        let wait = rl.retry_after("u");
        assert!(wait > Duration::ZERO && wait <= Duration::from_secs(60));
    }

    #[test]
    fn retry_after_zero_with_capacity() {
        let rl = RateLimiter::new(2, 0, Duration::from_secs(60));
        assert_eq!(rl.retry_after("u"), Duration::ZERO);
        assert!(rl.allow_message("u"));
        assert_eq!(rl.retry_after("u"), Duration::ZERO);
    }

    #[test]
    fn sweep_drops_stale_buckets_only() {
        let rl = RateLimiter::new(5, 0, Duration::from_millis(10));
        assert!(rl.allow_message("stale"));
        std::thread::sleep(Duration::from_millis(25));
        assert!(rl.allow_message("fresh"));
        rl.sweep();

        let guard = rl.inner.lock().unwrap();
        assert!(!guard.buckets.contains_key("stale"));
        assert!(guard.buckets.contains_key("fresh"));
    }
}
