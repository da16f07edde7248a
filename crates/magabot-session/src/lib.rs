//! Per-chat conversation state.
//!
//! A [`Session`] exists per `(platform, chat_id)` pair and holds a bounded
//! FIFO of conversation turns. Sessions are created lazily on first
//! message and never evicted in steady state — memory grows with the
//! number of distinct chats, which is acceptable for the intended
//! single-operator deployments.
//!
//! The manager captures a [`SendFn`] once at construction so background
//! tasks (reminders, job results) can message users after the inbound
//! event that spawned them has long returned.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::must_use_candidate)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default bound on per-session history length.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Boxed future returned by a send callback.
pub type SendFuture = Pin<Box<dyn Future<Output = magabot_core::CoreResult<()>> + Send>>;

/// Outbound callback: `(platform, chat_id, text)`.
///
/// Captured once at construction; typically a closure over the router's
/// `send` so notifications reach the originating transport.
pub type SendFn = Arc<dyn Fn(String, String, String) -> SendFuture + Send + Sync>;

/// Speaker role of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human correspondent.
    User,
    /// The bot.
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub content: String,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

/// A single chat's conversation state.
pub struct Session {
    /// Transport tag.
    pub platform: String,
    /// Chat identifier within the platform.
    pub chat_id: String,
    /// The chat's primary correspondent.
    pub user_id: String,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
    history: Mutex<VecDeque<HistoryEntry>>,
}

impl Session {
    fn new(platform: &str, chat_id: &str, user_id: &str) -> Self {
        Self {
            platform: platform.to_string(),
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Current history length.
    pub fn len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Whether the session has no history yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("platform", &self.platform)
            .field("chat_id", &self.chat_id)
            .field("history_len", &self.len())
            .finish()
    }
}

/// Owns every session and the outbound notification callback.
pub struct SessionManager {
    max_history: usize,
    sessions: RwLock<HashMap<(String, String), Arc<Session>>>,
    send_fn: SendFn,
}

impl SessionManager {
    /// Create a manager with the given history bound (clamped to ≥ 1).
    pub fn new(max_history: usize, send_fn: SendFn) -> Self {
        Self {
            max_history: max_history.max(1),
            sessions: RwLock::new(HashMap::new()),
            send_fn,
        }
    }

    /// Look up or lazily create the session for `(platform, chat_id)`.
    ///
    /// Idempotent under concurrent callers: losers of the insert race get
    /// the winner's session.
    pub fn get_or_create(&self, platform: &str, chat_id: &str, user_id: &str) -> Arc<Session> {
        let key = (platform.to_string(), chat_id.to_string());

        if let Ok(guard) = self.sessions.read() {
            if let Some(session) = guard.get(&key) {
                return session.clone();
            }
        }

        let mut guard = self
            .sessions
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard
            .entry(key)
            .or_insert_with(|| Arc::new(Session::new(platform, chat_id, user_id)))
            .clone()
    }

    /// Look up an existing session without creating one.
    pub fn get(&self, platform: &str, chat_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .ok()?
            .get(&(platform.to_string(), chat_id.to_string()))
            .cloned()
    }

    /// Append a turn, evicting from the front past the history bound.
    pub fn add_message(&self, session: &Session, role: Role, content: impl Into<String>) {
        let mut history = session
            .history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        history.push_back(HistoryEntry {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// Copy of the most recent `n` turns, oldest first.
    pub fn history(&self, session: &Session, n: usize) -> Vec<HistoryEntry> {
        let history = session
            .history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let skip = history.len().saturating_sub(n);
        history.iter().skip(skip).cloned().collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().map_or(0, |g| g.len())
    }

    /// Send `text` to a chat from a background task.
    ///
    /// Spawns the delivery so the caller never blocks; failures are logged.
    pub fn notify(&self, platform: &str, chat_id: &str, text: impl Into<String>) {
        let send = self.send_fn.clone();
        let platform = platform.to_string();
        let chat_id = chat_id.to_string();
        let text = text.into();
        tokio::spawn(async move {
            if let Err(e) = send(platform.clone(), chat_id.clone(), text).await {
                warn!(platform, chat_id, error = %e, "background notification failed");
            }
        });
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("max_history", &self.max_history)
            .field("sessions", &self.session_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn noop_send() -> SendFn {
        Arc::new(|_p, _c, _t| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mgr = SessionManager::new(10, noop_send());
        let a = mgr.get_or_create("telegram", "c1", "u1");
        let b = mgr.get_or_create("telegram", "c1", "u1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(mgr.session_count(), 1);
    }

    #[test]
    fn sessions_scoped_by_platform_and_chat() {
        let mgr = SessionManager::new(10, noop_send());
        mgr.get_or_create("telegram", "c1", "u1");
        mgr.get_or_create("slack", "c1", "u1");
        mgr.get_or_create("telegram", "c2", "u1");
        assert_eq!(mgr.session_count(), 3);
    }

    #[test]
    fn history_trims_from_front() {
        let mgr = SessionManager::new(3, noop_send());
        let session = mgr.get_or_create("t", "c", "u");
        for i in 0..5 {
            mgr.add_message(&session, Role::User, format!("m{i}"));
        }
        assert_eq!(session.len(), 3);
        let history = mgr.history(&session, 10);
        let texts: Vec<&str> = history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(texts, ["m2", "m3", "m4"]);
    }

    #[test]
    fn max_history_clamped_to_one() {
        let mgr = SessionManager::new(0, noop_send());
        let session = mgr.get_or_create("t", "c", "u");
        mgr.add_message(&session, Role::User, "a");
        mgr.add_message(&session, Role::Assistant, "b");
        assert_eq!(session.len(), 1);
        assert_eq!(mgr.history(&session, 10)[0].content, "b");
    }

    #[test]
    fn history_tail_selection() {
        let mgr = SessionManager::new(10, noop_send());
        let session = mgr.get_or_create("t", "c", "u");
        for i in 0..4 {
            mgr.add_message(&session, Role::User, format!("m{i}"));
        }
        let last_two = mgr.history(&session, 2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].content, "m2");
        assert_eq!(last_two[1].content, "m3");
    }

    #[test]
    fn first_user_id_wins() {
        let mgr = SessionManager::new(10, noop_send());
        let first = mgr.get_or_create("t", "c", "alice");
        let second = mgr.get_or_create("t", "c", "bob");
        assert_eq!(first.user_id, "alice");
        assert_eq!(second.user_id, "alice");
    }

    #[tokio::test]
    async fn concurrent_get_or_create_single_session() {
        let mgr = Arc::new(SessionManager::new(10, noop_send()));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let m = mgr.clone();
            handles.push(tokio::spawn(async move {
                m.get_or_create("t", "same", "u")
            }));
        }
        let sessions: Vec<Arc<Session>> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(mgr.session_count(), 1);
        for s in &sessions[1..] {
            assert!(Arc::ptr_eq(&sessions[0], s));
        }
    }

    #[tokio::test]
    async fn concurrent_add_message_never_exceeds_bound() {
        let mgr = Arc::new(SessionManager::new(5, noop_send()));
        let session = mgr.get_or_create("t", "c", "u");

        let mut handles = Vec::new();
        for i in 0..40 {
            let m = mgr.clone();
            let s = session.clone();
            handles.push(tokio::spawn(async move {
                m.add_message(&s, Role::User, format!("m{i}"));
            }));
        }
        futures::future::join_all(handles).await;
        assert_eq!(session.len(), 5);
    }

    #[tokio::test]
    async fn notify_reaches_send_fn() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let send: SendFn = Arc::new(move |platform, chat, text| {
            let calls = calls_clone.clone();
            Box::pin(async move {
                assert_eq!(platform, "telegram");
                assert_eq!(chat, "c9");
                assert_eq!(text, "reminder");
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        let mgr = SessionManager::new(10, send);
        mgr.notify("telegram", "c9", "reminder");

        for _ in 0..50 {
            if calls.load(Ordering::SeqCst) == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("notification was never delivered");
    }

    #[test]
    fn get_missing_returns_none() {
        let mgr = SessionManager::new(10, noop_send());
        assert!(mgr.get("t", "missing").is_none());
    }
}
