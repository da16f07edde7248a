//! WhatsApp adapter over the Business Cloud API.
//!
//! Outbound messages go to the Graph API (`/<phone_number_id>/messages`)
//! with up to three retries. Inbound traffic reaches a Cloud API bot only
//! through Meta's webhook callbacks, so this adapter owns no poll loop;
//! the daemon hands callback payloads to
//! [`WhatsAppAdapter::handle_callback`], which normalizes and dispatches
//! them like any other transport event.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use magabot_core::adapter::{HandlerSlot, MessageHandler, PlatformAdapter};
use magabot_core::error::{CoreError, CoreResult};
use magabot_core::message::IncomingMessage;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const PLATFORM: &str = "whatsapp";
const SEND_ATTEMPTS: u32 = 3;

/// WhatsApp transport.
pub struct WhatsAppAdapter {
    client: reqwest::Client,
    access_token: String,
    phone_number_id: String,
    api_base: String,
    slot: HandlerSlot,
    running: Arc<AtomicBool>,
}

impl WhatsAppAdapter {
    /// Create the adapter from Graph API credentials.
    pub fn new(
        access_token: impl Into<String>,
        phone_number_id: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            slot: HandlerSlot::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Feed one Meta webhook callback payload into the adapter.
    ///
    /// Extracts the first text message of the first entry (Meta batches at
    /// most one per callback in practice); ignores status updates and
    /// non-text content. Replies are sent back to the sender.
    pub async fn handle_callback(&self, ctx: CancellationToken, payload: &serde_json::Value) {
        if !self.running.load(Ordering::SeqCst) {
            warn!("whatsapp callback received while adapter is stopped");
            return;
        }
        let Some(incoming) = normalize_callback(payload) else {
            return;
        };

        let chat_id = incoming.chat_id.clone();
        match self.slot.dispatch(ctx, incoming).await {
            Ok(Some(reply)) => {
                if let Err(e) = self.send_text(&chat_id, &reply).await {
                    warn!(chat_id, error = %e, "whatsapp reply failed");
                }
            },
            Ok(None) => {},
            Err(e) => warn!(chat_id, error = %e, "whatsapp handler failed"),
        }
    }

    async fn send_text(&self, to: &str, text: &str) -> CoreResult<()> {
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": text }
        });

        let mut delay = Duration::from_secs(1);
        let mut last_error = String::new();
        for attempt in 1..=SEND_ATTEMPTS {
            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.access_token)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    return Ok(());
                },
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    warn!(attempt, %status, "whatsapp send rejected");
                    last_error = format!("{status}: {body}");
                },
                Err(e) => {
                    warn!(attempt, error = %e, "whatsapp send network error");
                    last_error = e.to_string();
                },
            }

            if attempt < SEND_ATTEMPTS {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        Err(CoreError::Transport {
            platform: PLATFORM.to_string(),
            message: last_error,
        })
    }
}

/// Extract `(sender, text)` from a Cloud API callback payload.
fn normalize_callback(payload: &serde_json::Value) -> Option<IncomingMessage> {
    let value = payload
        .get("entry")?
        .get(0)?
        .get("changes")?
        .get(0)?
        .get("value")?;
    let message = value.get("messages")?.get(0)?;

    if message["type"].as_str()? != "text" {
        return None;
    }
    let from = message["from"].as_str()?;
    let text = message["text"]["body"].as_str()?;
    if text.is_empty() {
        return None;
    }

    let username = value
        .get("contacts")
        .and_then(|c| c.get(0))
        .and_then(|c| c["profile"]["name"].as_str());

    let mut incoming =
        // Cloud API chats are 1:1 with the sender's phone number.
        IncomingMessage::new(PLATFORM, from, from, text).with_raw(payload.clone());
    if let Some(name) = username {
        incoming = incoming.with_username(name);
    }
    Some(incoming)
}

#[async_trait]
impl PlatformAdapter for WhatsAppAdapter {
    fn name(&self) -> &str {
        PLATFORM
    }

    async fn start(&self, _ctx: CancellationToken) -> CoreResult<()> {
        // No ingest task: inbound events arrive via Meta callbacks.
        self.running.store(true, Ordering::SeqCst);
        info!("whatsapp adapter started");
        Ok(())
    }

    async fn stop(&self) -> CoreResult<()> {
        self.running.store(false, Ordering::SeqCst);
        info!("whatsapp adapter stopped");
        Ok(())
    }

    async fn send(&self, chat_id: &str, text: &str) -> CoreResult<()> {
        self.send_text(chat_id, text).await
    }

    fn set_handler(&self, handler: MessageHandler) {
        self.slot.install(handler);
    }
}
