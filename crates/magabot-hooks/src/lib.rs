//! Lifecycle hook dispatch.
//!
//! Subscribers register a named callback under a free-form event name
//! (`on_start`, `on_stop`, ...). [`HookManager::fire`] invokes them in
//! registration order and collects per-hook failures without aborting the
//! rest; [`HookManager::fire_and_forget`] detaches the whole dispatch onto
//! its own task.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::must_use_candidate)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned by hook callbacks.
#[derive(Debug, Error)]
pub enum HookError {
    /// The callback reported a failure.
    #[error("hook failed: {0}")]
    Failed(String),
}

/// Result type for hook callbacks.
pub type HookResult = Result<(), HookError>;

/// Boxed future returned by a hook callback.
pub type HookFuture = Pin<Box<dyn Future<Output = HookResult> + Send>>;

/// A hook callback: receives the event payload.
pub type HookFn = Arc<dyn Fn(serde_json::Value) -> HookFuture + Send + Sync>;

struct Subscriber {
    name: String,
    callback: HookFn,
}

/// Registry mapping event names to subscriber lists.
#[derive(Clone, Default)]
pub struct HookManager {
    hooks: Arc<RwLock<HashMap<String, Vec<Subscriber>>>>,
}

impl HookManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `event` with a diagnostic `name`.
    pub fn register(&self, event: &str, name: impl Into<String>, callback: HookFn) {
        if let Ok(mut guard) = self.hooks.write() {
            guard.entry(event.to_string()).or_default().push(Subscriber {
                name: name.into(),
                callback,
            });
        }
    }

    /// Number of subscribers registered for `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.hooks
            .read()
            .map_or(0, |g| g.get(event).map_or(0, Vec::len))
    }

    /// Invoke all subscribers of `event` in registration order.
    ///
    /// Returns the names of subscribers that failed; a failing hook never
    /// prevents later hooks from running.
    pub async fn fire(&self, event: &str, payload: serde_json::Value) -> Vec<String> {
        let subscribers: Vec<(String, HookFn)> = match self.hooks.read() {
            Ok(guard) => guard
                .get(event)
                .map(|subs| {
                    subs.iter()
                        .map(|s| (s.name.clone(), s.callback.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        let mut failed = Vec::new();
        for (name, callback) in subscribers {
            debug!(event, hook = %name, "firing hook");
            if let Err(e) = callback(payload.clone()).await {
                warn!(event, hook = %name, error = %e, "hook failed");
                failed.push(name);
            }
        }
        failed
    }

    /// Fire `event` on a detached task; failures are logged, not returned.
    pub fn fire_and_forget(&self, event: &str, payload: serde_json::Value) {
        let manager = self.clone();
        let event = event.to_string();
        tokio::spawn(async move {
            manager.fire(&event, payload).await;
        });
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events = self
            .hooks
            .read()
            .map_or(0, |g| g.len());
        f.debug_struct("HookManager").field("events", &events).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_hook(counter: Arc<AtomicUsize>) -> HookFn {
        Arc::new(move |_payload| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
    }

    fn failing_hook() -> HookFn {
        Arc::new(|_payload| Box::pin(async { Err(HookError::Failed("boom".to_string())) }))
    }

    #[tokio::test]
    async fn fire_invokes_all_subscribers() {
        let manager = HookManager::new();
        let counter = Arc::new(AtomicUsize::new(0));
        manager.register("on_start", "a", counting_hook(counter.clone()));
        manager.register("on_start", "b", counting_hook(counter.clone()));

        let failed = manager.fire("on_start", serde_json::json!({})).await;
        assert!(failed.is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_does_not_stop_later_hooks() {
        let manager = HookManager::new();
        let counter = Arc::new(AtomicUsize::new(0));
        manager.register("on_stop", "bad", failing_hook());
        manager.register("on_stop", "good", counting_hook(counter.clone()));

        let failed = manager.fire("on_stop", serde_json::json!({})).await;
        assert_eq!(failed, vec!["bad".to_string()]);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_event_is_noop() {
        let manager = HookManager::new();
        let failed = manager.fire("nothing", serde_json::json!({})).await;
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn fire_and_forget_runs() {
        let manager = HookManager::new();
        let counter = Arc::new(AtomicUsize::new(0));
        manager.register("async_event", "a", counting_hook(counter.clone()));

        manager.fire_and_forget("async_event", serde_json::json!({"k": "v"}));

        // Wait for the detached task.
        for _ in 0..50 {
            if counter.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("fire_and_forget hook never ran");
    }

    #[tokio::test]
    async fn payload_reaches_subscriber() {
        let manager = HookManager::new();
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen_clone = seen.clone();
        manager.register(
            "evt",
            "observer",
            Arc::new(move |payload| {
                let seen = seen_clone.clone();
                Box::pin(async move {
                    *seen.lock().unwrap() = Some(payload);
                    Ok(())
                })
            }),
        );

        manager.fire("evt", serde_json::json!({"x": 1})).await;
        assert_eq!(
            seen.lock().unwrap().clone(),
            Some(serde_json::json!({"x": 1}))
        );
    }

    #[test]
    fn subscriber_count() {
        let manager = HookManager::new();
        assert_eq!(manager.subscriber_count("e"), 0);
        manager.register("e", "a", failing_hook());
        manager.register("e", "b", failing_hook());
        assert_eq!(manager.subscriber_count("e"), 2);
    }
}
