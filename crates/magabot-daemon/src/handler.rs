//! The application message handler.
//!
//! Installed on the router; runs after the policy pipeline. Maintains the
//! conversation session, calls the LLM, and archives message metadata.
//! LLM failures never cross the adapter boundary — they become a
//! user-visible reply here.

use std::sync::Arc;

use magabot_core::adapter::{MessageHandler, reply_future};
use magabot_core::hash_user_id;
use magabot_llm::{ChatMessage, ChatRole, LlmRouter};
use magabot_session::{Role, SessionManager};
use tracing::{info, warn};

use crate::storage::{Direction, Storage};

/// Reply sent when the model call fails.
const LLM_FAILURE_REPLY: &str =
    "Sorry, I couldn't reach the language model. Please try again in a moment.";

/// How much history each completion sees.
const CONTEXT_TURNS: usize = 20;

/// Build the handler closure installed on the router.
pub fn build(
    sessions: Arc<SessionManager>,
    llm: Arc<LlmRouter>,
    storage: Option<Arc<Storage>>,
) -> MessageHandler {
    Arc::new(move |_ctx, message| {
        let sessions = sessions.clone();
        let llm = llm.clone();
        let storage = storage.clone();

        reply_future(async move {
            let user_hash = hash_user_id(&message.user_id);

            // Commands short-circuit before any model call.
            if message.is_command() {
                return Ok(handle_command(&sessions, &message.text));
            }

            let session =
                sessions.get_or_create(&message.platform, &message.chat_id, &message.user_id);
            sessions.add_message(&session, Role::User, &message.text);
            record(
                storage.as_deref(),
                &message.platform,
                &message.chat_id,
                &user_hash,
                Direction::Inbound,
                message.text.len(),
            );

            let history: Vec<ChatMessage> = sessions
                .history(&session, CONTEXT_TURNS)
                .into_iter()
                .map(|entry| ChatMessage {
                    role: match entry.role {
                        Role::User => ChatRole::User,
                        Role::Assistant => ChatRole::Assistant,
                    },
                    content: entry.content,
                })
                .collect();

            let reply = match llm.chat(None, &history).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(
                        platform = %message.platform,
                        user = %user_hash,
                        error = %e,
                        "llm call failed"
                    );
                    LLM_FAILURE_REPLY.to_string()
                },
            };

            sessions.add_message(&session, Role::Assistant, &reply);
            record(
                storage.as_deref(),
                &message.platform,
                &message.chat_id,
                &user_hash,
                Direction::Outbound,
                reply.len(),
            );
            info!(platform = %message.platform, user = %user_hash, "handled message");
            Ok(reply)
        })
    })
}

fn handle_command(sessions: &SessionManager, text: &str) -> String {
    let command = text.split_whitespace().next().unwrap_or(text);
    match command {
        "/help" => "Commands: /help, /status".to_string(),
        "/status" => format!("Running. Active sessions: {}", sessions.session_count()),
        _ => format!("Unknown command: {command}"),
    }
}

fn record(
    storage: Option<&Storage>,
    platform: &str,
    chat_id: &str,
    user_hash: &str,
    direction: Direction,
    length: usize,
) {
    if let Some(storage) = storage {
        if let Err(e) = storage.record(platform, chat_id, user_hash, direction, length) {
            warn!(error = %e, "failed to archive message metadata");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use magabot_core::IncomingMessage;
    use magabot_llm::{LlmError, LlmProvider, LlmResult};
    use magabot_session::SendFn;
    use tokio_util::sync::CancellationToken;

    use super::*;

    struct ScriptedProvider {
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn model(&self) -> &str {
            "scripted-1"
        }
        async fn chat(&self, messages: &[ChatMessage]) -> LlmResult<String> {
            if self.fail {
                return Err(LlmError::Api {
                    provider: "scripted".to_string(),
                    status: 500,
                    message: "down".to_string(),
                });
            }
            Ok(format!("reply to: {}", messages.last().map_or("", |m| &m.content)))
        }
    }

    fn noop_send() -> SendFn {
        Arc::new(|_p, _c, _t| Box::pin(async { Ok(()) }))
    }

    fn setup(fail: bool) -> (MessageHandler, Arc<SessionManager>, Arc<Storage>) {
        let sessions = Arc::new(SessionManager::new(50, noop_send()));
        let mut router = LlmRouter::new();
        router.register(Arc::new(ScriptedProvider { fail }));
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let handler = build(sessions.clone(), Arc::new(router), Some(storage.clone()));
        (handler, sessions, storage)
    }

    #[tokio::test]
    async fn replies_and_records_history() {
        let (handler, sessions, storage) = setup(false);
        let reply = handler(
            CancellationToken::new(),
            IncomingMessage::new("telegram", "c1", "u1", "hello there"),
        )
        .await
        .unwrap();

        assert_eq!(reply, "reply to: hello there");
        let session = sessions.get("telegram", "c1").unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(storage.message_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn llm_failure_becomes_reply_not_error() {
        let (handler, sessions, _storage) = setup(true);
        let reply = handler(
            CancellationToken::new(),
            IncomingMessage::new("telegram", "c1", "u1", "hello"),
        )
        .await
        .unwrap();

        assert_eq!(reply, LLM_FAILURE_REPLY);
        // The failure reply still lands in history so the conversation
        // stays coherent.
        let session = sessions.get("telegram", "c1").unwrap();
        assert_eq!(session.len(), 2);
    }

    #[tokio::test]
    async fn commands_skip_the_model() {
        let (handler, _sessions, storage) = setup(true);
        let reply = handler(
            CancellationToken::new(),
            IncomingMessage::new("telegram", "c1", "u1", "/help"),
        )
        .await
        .unwrap();

        assert!(reply.contains("/status"));
        // No archive entries for command traffic.
        assert_eq!(storage.message_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn status_command_reports_sessions() {
        let (handler, sessions, _storage) = setup(false);
        sessions.get_or_create("telegram", "c9", "u9");

        let reply = handler(
            CancellationToken::new(),
            IncomingMessage::new("telegram", "c1", "u1", "/status"),
        )
        .await
        .unwrap();
        assert_eq!(reply, "Running. Active sessions: 1");
    }

    #[tokio::test]
    async fn unknown_command_reply() {
        let (handler, _sessions, _storage) = setup(false);
        let reply = handler(
            CancellationToken::new(),
            IncomingMessage::new("telegram", "c1", "u1", "/frobnicate now"),
        )
        .await
        .unwrap();
        assert_eq!(reply, "Unknown command: /frobnicate");
    }

    #[tokio::test]
    async fn history_accumulates_across_turns() {
        let (handler, sessions, _storage) = setup(false);
        for i in 0..3 {
            handler(
                CancellationToken::new(),
                IncomingMessage::new("telegram", "c1", "u1", format!("turn {i}")),
            )
            .await
            .unwrap();
        }
        let session = sessions.get("telegram", "c1").unwrap();
        assert_eq!(session.len(), 6);
    }
}
