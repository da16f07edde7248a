//! Telegram Bot API adapter.
//!
//! Long-polls `getUpdates` on its own task, normalizes messages (text,
//! captions, photos, voice notes, documents) into [`IncomingMessage`], and
//! replies with `sendMessage`. Poll failures back off exponentially from
//! one second to thirty.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use magabot_core::adapter::{HandlerSlot, MessageHandler, PlatformAdapter};
use magabot_core::error::{CoreError, CoreResult};
use magabot_core::media;
use magabot_core::message::IncomingMessage;
use teloxide::net::Download;
use teloxide::payloads::GetUpdatesSetters as _;
use teloxide::prelude::*;
use teloxide::requests::Request as _;
use teloxide::types::{FileMeta, MediaKind, Message, MessageKind, UpdateKind};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PLATFORM: &str = "telegram";
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// State shared between the adapter surface and its ingest task.
struct Ingest {
    bot: Bot,
    poll_timeout_secs: u32,
    downloads_dir: PathBuf,
    slot: HandlerSlot,
}

/// Telegram transport.
pub struct TelegramAdapter {
    ingest: Arc<Ingest>,
    stop: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TelegramAdapter {
    /// Create the adapter. `downloads_dir` receives media files.
    pub fn new(bot_token: &str, poll_timeout_secs: u32, downloads_dir: PathBuf) -> Self {
        Self {
            ingest: Arc::new(Ingest {
                bot: Bot::new(bot_token),
                poll_timeout_secs,
                downloads_dir,
                slot: HandlerSlot::new(),
            }),
            stop: Mutex::new(None),
            task: Mutex::new(None),
        }
    }
}

impl Ingest {
    async fn poll_loop(self: Arc<Self>, ctx: CancellationToken) {
        let mut offset: i32 = 0;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let request = self
                .bot
                .get_updates()
                .offset(offset)
                .timeout(self.poll_timeout_secs);

            let updates = tokio::select! {
                () = ctx.cancelled() => {
                    info!("telegram poll loop stopping");
                    return;
                },
                result = request.send() => match result {
                    Ok(updates) => {
                        backoff = INITIAL_BACKOFF;
                        updates
                    },
                    Err(e) => {
                        warn!(error = %e, backoff_secs = backoff.as_secs(), "telegram poll failed");
                        tokio::select! {
                            () = ctx.cancelled() => return,
                            () = tokio::time::sleep(backoff) => {},
                        }
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue;
                    },
                },
            };

            for update in updates {
                // Advance past this update regardless of how handling goes.
                offset = update.id.0 as i32 + 1;

                let message = match &update.kind {
                    UpdateKind::Message(msg) | UpdateKind::EditedMessage(msg) => msg,
                    _ => continue,
                };
                if let Some(incoming) = self.normalize(message).await {
                    self.handle(ctx.child_token(), incoming).await;
                }
            }
        }
    }

    /// Collapse a native Telegram message into the common shape.
    ///
    /// Messages without a sender (channel posts) are skipped — there is no
    /// identity to authorize. Edits arrive through the same path as new
    /// messages and are treated as fresh input.
    async fn normalize(&self, msg: &Message) -> Option<IncomingMessage> {
        let user = msg.from.as_ref()?;
        let chat_id = msg.chat.id.to_string();
        let user_id = user.id.to_string();

        let mut text = msg
            .text()
            .or_else(|| msg.caption())
            .unwrap_or_default()
            .to_string();
        let mut media_paths = Vec::new();

        if let MessageKind::Common(common) = &msg.kind {
            let file_meta = match &common.media_kind {
                MediaKind::Photo(photo) => {
                    // Telegram sends several resolutions; keep the largest.
                    photo
                        .photo
                        .iter()
                        .max_by_key(|p| p.file.size)
                        .map(|p| (p.file.clone(), format!("{}.jpg", p.file.unique_id)))
                },
                MediaKind::Document(doc) => {
                    let name = doc
                        .document
                        .file_name
                        .clone()
                        .unwrap_or_else(|| format!("{}.bin", doc.document.file.unique_id));
                    Some((doc.document.file.clone(), name))
                },
                MediaKind::Voice(voice) => Some((
                    voice.voice.file.clone(),
                    format!("{}.ogg", voice.voice.file.unique_id),
                )),
                _ => None,
            };

            if let Some((meta, name)) = file_meta {
                match self.download_media(&meta, &name).await {
                    Ok(path) => media_paths.push(path),
                    Err(e) => warn!(error = %e, "telegram media download failed"),
                }
                if text.is_empty() {
                    text = format!("[media: {name}]");
                }
            }
        }

        if text.is_empty() && media_paths.is_empty() {
            return None;
        }

        let mut incoming = IncomingMessage::new(PLATFORM, chat_id, user_id, text)
            .with_raw(serde_json::to_value(msg).unwrap_or_default());
        if let Some(username) = &user.username {
            incoming = incoming.with_username(username.clone());
        }
        for path in media_paths {
            incoming = incoming.with_media(path);
        }
        Some(incoming)
    }

    /// Fetch a file through the Bot API into the downloads directory,
    /// honouring the size cap and extension allow-list.
    async fn download_media(&self, meta: &FileMeta, name: &str) -> CoreResult<PathBuf> {
        media::check_size(u64::from(meta.size))?;

        let file = self
            .bot
            .get_file(meta.id.clone())
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        let safe_name = media::sanitize_file_name(name);
        let dest = self
            .downloads_dir
            .join(format!("{}-{safe_name}", meta.unique_id));
        let dest = media::safe_media_path(&self.downloads_dir, &dest)?;

        tokio::fs::create_dir_all(&self.downloads_dir).await?;
        let mut out = tokio::fs::File::create(&dest).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&dest, perms).await?;
        }

        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| transport(e.to_string()))?;

        debug!(path = %dest.display(), "downloaded telegram media");
        Ok(dest)
    }

    async fn handle(&self, ctx: CancellationToken, incoming: IncomingMessage) {
        let chat_id = incoming.chat_id.clone();
        match self.slot.dispatch(ctx, incoming).await {
            Ok(Some(reply)) => {
                if let Err(e) = send_text(&self.bot, &chat_id, &reply).await {
                    warn!(chat_id, error = %e, "telegram reply failed");
                }
            },
            Ok(None) => {},
            Err(e) => warn!(chat_id, error = %e, "telegram handler failed"),
        }
    }
}

async fn send_text(bot: &Bot, chat_id: &str, text: &str) -> CoreResult<()> {
    let id: i64 = chat_id
        .parse()
        .map_err(|_| transport(format!("bad chat id: {chat_id}")))?;
    bot.send_message(ChatId(id), text)
        .send()
        .await
        .map_err(|e| transport(e.to_string()))?;
    Ok(())
}

fn transport(message: String) -> CoreError {
    CoreError::Transport {
        platform: PLATFORM.to_string(),
        message,
    }
}

#[async_trait]
impl PlatformAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        PLATFORM
    }

    async fn start(&self, ctx: CancellationToken) -> CoreResult<()> {
        let handle = tokio::spawn(self.ingest.clone().poll_loop(ctx.clone()));
        *self.stop.lock().await = Some(ctx);
        *self.task.lock().await = Some(handle);
        info!("telegram adapter started");
        Ok(())
    }

    async fn stop(&self) -> CoreResult<()> {
        if let Some(token) = self.stop.lock().await.take() {
            token.cancel();
        }
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
        info!("telegram adapter stopped");
        Ok(())
    }

    async fn send(&self, chat_id: &str, text: &str) -> CoreResult<()> {
        send_text(&self.ingest.bot, chat_id, text).await
    }

    fn set_handler(&self, handler: MessageHandler) {
        self.ingest.slot.install(handler);
    }
}
