//! The platform adapter contract.
//!
//! An adapter is a bidirectional transport: it turns native events into
//! [`IncomingMessage`]s, feeds them to the single installed handler, and
//! sends reply text back on the originating chat. Concrete implementations
//! live in `magabot-adapters` and `magabot-webhook`.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::CoreResult;
use crate::message::IncomingMessage;

/// Boxed future returned by a message handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = CoreResult<String>> + Send>>;

/// The inbound callback installed on every adapter.
///
/// Returns the reply text; an empty string means "do not reply". The
/// [`CancellationToken`] is the per-event context: it is a child of the
/// daemon token and fires on shutdown.
pub type MessageHandler =
    Arc<dyn Fn(CancellationToken, IncomingMessage) -> HandlerFuture + Send + Sync>;

/// Wrap an async closure result into a [`HandlerFuture`].
pub fn reply_future<F>(fut: F) -> HandlerFuture
where
    F: Future<Output = CoreResult<String>> + Send + 'static,
{
    Box::pin(fut)
}

/// A bidirectional chat transport.
///
/// `start` must not block: it launches the adapter's own ingest task(s) and
/// returns. `stop` returns only after every ingest task has observed the
/// stop request and the send path is drained. `send` is safe to call
/// concurrently.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Transport tag, stable across restarts (`telegram`, `slack`, ...).
    fn name(&self) -> &str;

    /// Launch the ingest task(s). Non-blocking.
    async fn start(&self, ctx: CancellationToken) -> CoreResult<()>;

    /// Stop all tasks and drain the send path.
    async fn stop(&self) -> CoreResult<()>;

    /// Send `text` to `chat_id` on this transport.
    async fn send(&self, chat_id: &str, text: &str) -> CoreResult<()>;

    /// Install the inbound callback, replacing any prior one.
    fn set_handler(&self, handler: MessageHandler);
}

/// The guarded handler slot shared by all adapter implementations.
///
/// Installation takes the write lock; dispatch clones the `Arc` under the
/// read lock so the two never block each other for longer than the clone.
#[derive(Clone, Default)]
pub struct HandlerSlot {
    inner: Arc<RwLock<Option<MessageHandler>>>,
}

impl HandlerSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler, replacing any prior one.
    pub fn install(&self, handler: MessageHandler) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = Some(handler);
        }
    }

    /// Clone the installed handler, if any.
    pub fn get(&self) -> Option<MessageHandler> {
        self.inner.read().ok().and_then(|guard| guard.clone())
    }

    /// Dispatch a message through the installed handler.
    ///
    /// Returns `Ok(None)` when no handler is installed or the reply is
    /// empty; transport code treats both as "nothing to send".
    pub async fn dispatch(
        &self,
        ctx: CancellationToken,
        message: IncomingMessage,
    ) -> CoreResult<Option<String>> {
        let Some(handler) = self.get() else {
            return Ok(None);
        };
        let reply = handler(ctx, message).await?;
        if reply.is_empty() {
            Ok(None)
        } else {
            Ok(Some(reply))
        }
    }
}

impl std::fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let installed = self.get().is_some();
        f.debug_struct("HandlerSlot")
            .field("installed", &installed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_handler() -> MessageHandler {
        Arc::new(|_ctx, msg| reply_future(async move { Ok(format!("echo {}", msg.text)) }))
    }

    #[tokio::test]
    async fn empty_slot_dispatches_nothing() {
        let slot = HandlerSlot::new();
        let out = slot
            .dispatch(
                CancellationToken::new(),
                IncomingMessage::new("t", "c", "u", "hi"),
            )
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn installed_handler_receives_message() {
        let slot = HandlerSlot::new();
        slot.install(echo_handler());

        let out = slot
            .dispatch(
                CancellationToken::new(),
                IncomingMessage::new("t", "c", "u", "hi"),
            )
            .await
            .unwrap();
        assert_eq!(out.as_deref(), Some("echo hi"));
    }

    #[tokio::test]
    async fn empty_reply_means_silent() {
        let slot = HandlerSlot::new();
        slot.install(Arc::new(|_ctx, _msg| {
            reply_future(async move { Ok(String::new()) })
        }));

        let out = slot
            .dispatch(
                CancellationToken::new(),
                IncomingMessage::new("t", "c", "u", "hi"),
            )
            .await
            .unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn install_replaces_prior_handler() {
        let slot = HandlerSlot::new();
        slot.install(echo_handler());
        slot.install(Arc::new(|_ctx, _msg| {
            reply_future(async move { Ok("second".to_string()) })
        }));

        let out = slot
            .dispatch(
                CancellationToken::new(),
                IncomingMessage::new("t", "c", "u", "hi"),
            )
            .await
            .unwrap();
        assert_eq!(out.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn concurrent_install_and_dispatch() {
        let slot = HandlerSlot::new();
        slot.install(echo_handler());

        let mut handles = Vec::new();
        for i in 0..8 {
            let s = slot.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    s.install(echo_handler());
                    None
                } else {
                    s.dispatch(
                        CancellationToken::new(),
                        IncomingMessage::new("t", "c", "u", "x"),
                    )
                    .await
                    .ok()
                    .flatten()
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }
}
