//! The receiver as a platform adapter.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use magabot_audit::AuditLogger;
use magabot_config::WebhookConfig;
use magabot_core::adapter::{MessageHandler, PlatformAdapter};
use magabot_core::error::{CoreError, CoreResult};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::server::{WebhookState, build_router};

/// HTTP webhook receiver.
///
/// Registered with the router like any other adapter; `start` binds the
/// listener and serves until the daemon token fires. The receive path is
/// the whole point — [`PlatformAdapter::send`] always fails.
pub struct WebhookAdapter {
    state: Arc<WebhookState>,
    task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl WebhookAdapter {
    /// Create a receiver from its config section.
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            state: Arc::new(WebhookState::new(config)),
            task: Mutex::new(None),
        }
    }

    /// Attach the audit logger.
    pub fn attach_audit(&self, audit: Arc<AuditLogger>) {
        if let Ok(mut guard) = self.state.audit.write() {
            *guard = Some(audit);
        }
    }

    /// The axum application, for in-process driving in tests.
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone())
    }

    fn bind_addr(&self) -> String {
        format!(
            "{}:{}",
            self.state.config.bind_addr, self.state.config.port
        )
    }
}

#[async_trait]
impl PlatformAdapter for WebhookAdapter {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn start(&self, ctx: CancellationToken) -> CoreResult<()> {
        let addr = self.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| CoreError::Transport {
                platform: "webhook".to_string(),
                message: format!("bind {addr} failed: {e}"),
            })?;

        let app = build_router(self.state.clone())
            .into_make_service_with_connect_info::<SocketAddr>();

        // Tie the daemon token to this receiver's own token so both a
        // top-level cancellation and a direct `stop` drain the server.
        let state_ctx = self.state.ctx.clone();
        tokio::spawn(async move {
            ctx.cancelled().await;
            state_ctx.cancel();
        });

        let shutdown = self.state.ctx.clone();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                shutdown.cancelled().await;
            });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "webhook server error");
            }
        });

        *self.task.lock().await = Some(handle);
        info!(addr = %addr, "webhook receiver listening");
        Ok(())
    }

    async fn stop(&self) -> CoreResult<()> {
        self.state.ctx.cancel();
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
        info!("webhook receiver stopped");
        Ok(())
    }

    async fn send(&self, _chat_id: &str, _text: &str) -> CoreResult<()> {
        Err(CoreError::ReceiveOnly {
            platform: "webhook".to_string(),
        })
    }

    fn set_handler(&self, handler: MessageHandler) {
        self.state.slot.install(handler);
    }
}
