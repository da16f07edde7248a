//! The normalized inbound message.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform-agnostic inbound message.
///
/// Constructed by an adapter from its native event, handed to the router,
/// and dropped once the handler returns. `chat_id` and `user_id` are opaque
/// strings that are unique only within `platform`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Transport tag (`telegram`, `slack`, `whatsapp`, `webhook`).
    pub platform: String,
    /// Conversation identifier, unique within the platform.
    pub chat_id: String,
    /// Sender identifier, unique within the platform.
    pub user_id: String,
    /// Optional display name.
    pub username: Option<String>,
    /// Message text (caption text for media-only messages).
    pub text: String,
    /// Local paths of media the adapter downloaded, in arrival order.
    pub media: Vec<PathBuf>,
    /// Arrival instant.
    pub timestamp: DateTime<Utc>,
    /// Platform-specific payload, opaque to the router.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl IncomingMessage {
    /// Create a message with the given identity and text; remaining fields
    /// take their defaults.
    pub fn new(
        platform: impl Into<String>,
        chat_id: impl Into<String>,
        user_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            username: None,
            text: text.into(),
            media: Vec::new(),
            timestamp: Utc::now(),
            raw: serde_json::Value::Null,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Attach a downloaded media path.
    #[must_use]
    pub fn with_media(mut self, path: PathBuf) -> Self {
        self.media.push(path);
        self
    }

    /// Attach the raw platform payload.
    #[must_use]
    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = raw;
        self
    }

    /// Whether the text is a `/`-prefixed command.
    pub fn is_command(&self) -> bool {
        self.text.starts_with('/')
    }
}
