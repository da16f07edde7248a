//! Per-platform user allow-lists.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Decides which user IDs may talk to the bot on each platform.
///
/// Semantics match initial-setup bootstrap: a platform registered with an
/// empty set allows everyone (so a fresh install can receive its first
/// message), while a platform that was never registered denies everyone.
/// Entries of the form `prefix:*` match any ID carrying that colon prefix.
pub struct Authorizer {
    allowed: RwLock<HashMap<String, HashSet<String>>>,
}

impl Authorizer {
    /// Create an authorizer with no known platforms.
    pub fn new() -> Self {
        Self {
            allowed: RwLock::new(HashMap::new()),
        }
    }

    /// Atomically replace the allow-list for `platform`.
    pub fn set_allowed<I, S>(&self, platform: &str, users: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: HashSet<String> = users.into_iter().map(Into::into).collect();
        if let Ok(mut guard) = self.allowed.write() {
            guard.insert(platform.to_string(), set);
        }
    }

    /// Whether `user_id` may send on `platform`.
    pub fn is_allowed(&self, platform: &str, user_id: &str) -> bool {
        let Ok(guard) = self.allowed.read() else {
            return false;
        };
        let Some(set) = guard.get(platform) else {
            // Unknown platform: deny.
            return false;
        };
        if set.is_empty() {
            // Known platform with no restrictions: allow all.
            return true;
        }
        if set.contains(user_id) {
            return true;
        }
        set.iter().any(|entry| {
            entry
                .strip_suffix(":*")
                .is_some_and(|prefix| user_id.starts_with(prefix) && user_id[prefix.len()..].starts_with(':'))
        })
    }

    /// Platforms with a registered allow-list.
    pub fn platforms(&self) -> Vec<String> {
        self.allowed
            .read()
            .map_or_else(|_| Vec::new(), |g| g.keys().cloned().collect())
    }
}

impl Default for Authorizer {
    fn default() -> Self {
        Self::new()
    }
}
