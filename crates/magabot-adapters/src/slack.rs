//! Slack adapter over Socket Mode.
//!
//! Opens a WebSocket via `apps.connections.open` (app-level token),
//! acknowledges every envelope by `envelope_id`, and normalizes
//! `events_api` message events. Replies go out through the Web API
//! (`chat.postMessage`) with the bot token. The socket reconnects with
//! backoff when Slack closes it (Slack rotates connections routinely).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use magabot_core::adapter::{HandlerSlot, MessageHandler, PlatformAdapter};
use magabot_core::error::{CoreError, CoreResult};
use magabot_core::message::IncomingMessage;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PLATFORM: &str = "slack";
const SLACK_API: &str = "https://slack.com/api";
const RECONNECT_BACKOFF: Duration = Duration::from_secs(3);

#[derive(Deserialize)]
struct ConnectionsOpenResponse {
    ok: bool,
    url: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    envelope_id: Option<String>,
    payload: Option<serde_json::Value>,
}

struct Ingest {
    client: reqwest::Client,
    bot_token: String,
    app_token: String,
    slot: HandlerSlot,
}

/// Slack transport.
pub struct SlackAdapter {
    ingest: Arc<Ingest>,
    stop: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SlackAdapter {
    /// Create the adapter from the two Slack tokens.
    pub fn new(bot_token: impl Into<String>, app_token: impl Into<String>) -> Self {
        Self {
            ingest: Arc::new(Ingest {
                client: reqwest::Client::new(),
                bot_token: bot_token.into(),
                app_token: app_token.into(),
                slot: HandlerSlot::new(),
            }),
            stop: Mutex::new(None),
            task: Mutex::new(None),
        }
    }
}

impl Ingest {
    /// Ask Slack for a fresh Socket Mode URL.
    async fn open_socket_url(&self) -> CoreResult<String> {
        let response: ConnectionsOpenResponse = self
            .client
            .post(format!("{SLACK_API}/apps.connections.open"))
            .bearer_auth(&self.app_token)
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| transport(e.to_string()))?;

        if !response.ok {
            return Err(transport(format!(
                "apps.connections.open failed: {}",
                response.error.unwrap_or_default()
            )));
        }
        response
            .url
            .ok_or_else(|| transport("apps.connections.open returned no url".to_string()))
    }

    async fn socket_loop(self: Arc<Self>, ctx: CancellationToken) {
        loop {
            if ctx.is_cancelled() {
                info!("slack socket loop stopping");
                return;
            }

            let url = match self.open_socket_url().await {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "slack socket open failed");
                    tokio::select! {
                        () = ctx.cancelled() => return,
                        () = tokio::time::sleep(RECONNECT_BACKOFF) => continue,
                    }
                },
            };

            match self.run_connection(&ctx, &url).await {
                Ok(()) => return, // cancelled
                Err(e) => {
                    warn!(error = %e, "slack socket dropped, reconnecting");
                    tokio::select! {
                        () = ctx.cancelled() => return,
                        () = tokio::time::sleep(RECONNECT_BACKOFF) => {},
                    }
                },
            }
        }
    }

    /// Drive one WebSocket connection until cancellation (`Ok`) or a
    /// transport failure (`Err`, caller reconnects).
    async fn run_connection(&self, ctx: &CancellationToken, url: &str) -> CoreResult<()> {
        let (mut socket, _response) = connect_async(url)
            .await
            .map_err(|e| transport(e.to_string()))?;
        info!("slack socket connected");

        loop {
            let frame = tokio::select! {
                () = ctx.cancelled() => {
                    let _ = socket.close(None).await;
                    return Ok(());
                },
                frame = socket.next() => frame,
            };

            let Some(frame) = frame else {
                return Err(transport("socket closed by peer".to_string()));
            };
            let frame = frame.map_err(|e| transport(e.to_string()))?;

            match frame {
                WsMessage::Text(text) => {
                    let Ok(envelope) = serde_json::from_str::<Envelope>(&text) else {
                        debug!("unparseable slack frame");
                        continue;
                    };

                    // Ack first: Slack redelivers unacked envelopes.
                    if let Some(envelope_id) = &envelope.envelope_id {
                        let ack = json!({ "envelope_id": envelope_id }).to_string();
                        socket
                            .send(WsMessage::Text(ack))
                            .await
                            .map_err(|e| transport(e.to_string()))?;
                    }

                    match envelope.kind.as_str() {
                        "hello" => debug!("slack hello received"),
                        "disconnect" => {
                            return Err(transport("server requested reconnect".to_string()));
                        },
                        "events_api" => {
                            if let Some(incoming) =
                                envelope.payload.as_ref().and_then(normalize_event)
                            {
                                self.handle(ctx.child_token(), incoming).await;
                            }
                        },
                        other => debug!(kind = other, "ignoring slack envelope"),
                    }
                },
                WsMessage::Ping(payload) => {
                    socket
                        .send(WsMessage::Pong(payload))
                        .await
                        .map_err(|e| transport(e.to_string()))?;
                },
                WsMessage::Close(_) => {
                    return Err(transport("socket closed by peer".to_string()));
                },
                _ => {},
            }
        }
    }

    async fn handle(&self, ctx: CancellationToken, incoming: IncomingMessage) {
        let chat_id = incoming.chat_id.clone();
        match self.slot.dispatch(ctx, incoming).await {
            Ok(Some(reply)) => {
                if let Err(e) = self.post_message(&chat_id, &reply).await {
                    warn!(chat_id, error = %e, "slack reply failed");
                }
            },
            Ok(None) => {},
            Err(e) => warn!(chat_id, error = %e, "slack handler failed"),
        }
    }

    async fn post_message(&self, channel: &str, text: &str) -> CoreResult<()> {
        #[derive(Deserialize)]
        struct PostResponse {
            ok: bool,
            error: Option<String>,
        }

        let response: PostResponse = self
            .client
            .post(format!("{SLACK_API}/chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(&json!({ "channel": channel, "text": text }))
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| transport(e.to_string()))?;

        if !response.ok {
            return Err(transport(format!(
                "chat.postMessage failed: {}",
                response.error.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

/// Extract a user message from an Events API payload.
///
/// Bot echoes (`bot_id` present), message edits carried as subtypes, and
/// non-message events all normalize to `None`.
fn normalize_event(payload: &serde_json::Value) -> Option<IncomingMessage> {
    let event = payload.get("event")?;
    if event["type"].as_str()? != "message" {
        return None;
    }
    if event.get("bot_id").is_some() || event.get("subtype").is_some() {
        return None;
    }

    let channel = event["channel"].as_str()?;
    let user = event["user"].as_str()?;
    let text = event["text"].as_str().unwrap_or_default();
    if text.is_empty() {
        return None;
    }

    Some(
        IncomingMessage::new(PLATFORM, channel, user, text).with_raw(payload.clone()),
    )
}

fn transport(message: String) -> CoreError {
    CoreError::Transport {
        platform: PLATFORM.to_string(),
        message,
    }
}

#[async_trait]
impl PlatformAdapter for SlackAdapter {
    fn name(&self) -> &str {
        PLATFORM
    }

    async fn start(&self, ctx: CancellationToken) -> CoreResult<()> {
        let handle = tokio::spawn(self.ingest.clone().socket_loop(ctx.clone()));
        *self.stop.lock().await = Some(ctx);
        *self.task.lock().await = Some(handle);
        info!("slack adapter started");
        Ok(())
    }

    async fn stop(&self) -> CoreResult<()> {
        if let Some(token) = self.stop.lock().await.take() {
            token.cancel();
        }
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
        info!("slack adapter stopped");
        Ok(())
    }

    async fn send(&self, chat_id: &str, text: &str) -> CoreResult<()> {
        self.ingest.post_message(chat_id, text).await
    }

    fn set_handler(&self, handler: MessageHandler) {
        self.ingest.slot.install(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_payload(text: &str) -> serde_json::Value {
        json!({
            "event": {
                "type": "message",
                "channel": "C123",
                "user": "U456",
                "text": text,
                "ts": "1700000000.000100"
            }
        })
    }

    #[test]
    fn normalizes_plain_message() {
        let incoming = normalize_event(&message_payload("hello")).unwrap();
        assert_eq!(incoming.platform, "slack");
        assert_eq!(incoming.chat_id, "C123");
        assert_eq!(incoming.user_id, "U456");
        assert_eq!(incoming.text, "hello");
    }

    #[test]
    fn ignores_bot_messages() {
        let mut payload = message_payload("hi");
        payload["event"]["bot_id"] = json!("B1");
        assert!(normalize_event(&payload).is_none());
    }

    #[test]
    fn ignores_subtyped_messages() {
        let mut payload = message_payload("hi");
        payload["event"]["subtype"] = json!("message_changed");
        assert!(normalize_event(&payload).is_none());
    }

    #[test]
    fn ignores_non_message_events() {
        let payload = json!({"event": {"type": "reaction_added", "user": "U1"}});
        assert!(normalize_event(&payload).is_none());
    }

    #[test]
    fn ignores_empty_text() {
        assert!(normalize_event(&message_payload("")).is_none());
    }

    #[test]
    fn envelope_parsing() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"type": "events_api", "envelope_id": "e-1", "payload": {"event": {}}}"#,
        )
        .unwrap();
        assert_eq!(envelope.kind, "events_api");
        assert_eq!(envelope.envelope_id.as_deref(), Some("e-1"));
        assert!(envelope.payload.is_some());
    }

    #[tokio::test]
    async fn stop_without_start_is_ok() {
        let adapter = SlackAdapter::new("xoxb-test", "xapp-test");
        adapter.stop().await.unwrap();
    }
}
