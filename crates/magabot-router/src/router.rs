//! The router implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use magabot_audit::{AuditLogger, SecurityEvent, SecurityEventKind};
use magabot_core::{
    CoreResult, IncomingMessage, MessageHandler, PlatformAdapter, hash_user_id, reply_future,
};
use magabot_security::{Authorizer, RateLimiter};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{RouterError, RouterResult};

/// Fixed reply sent when a user exceeds their rate budget.
pub const RATE_LIMITED_REPLY: &str =
    "You're sending messages too quickly. Please slow down.";

/// Fixed reply sent to users who are not on the allow-list.
pub const UNAUTHORIZED_REPLY: &str = "You are not authorized to use this bot.";

/// Bound on how long `stop` waits for the adapters.
pub const STOP_DEADLINE: Duration = Duration::from_secs(10);

struct Registry {
    by_name: HashMap<String, Arc<dyn PlatformAdapter>>,
    /// Registration order, used for `start`.
    order: Vec<String>,
}

/// State shared between the router surface and the handler closures it
/// installs on adapters.
struct Inner {
    registry: RwLock<Registry>,
    handler: RwLock<Option<MessageHandler>>,
    rate_limiter: Arc<RateLimiter>,
    authorizer: Arc<Authorizer>,
    audit: RwLock<Option<Arc<AuditLogger>>>,
}

/// Adapter registry plus the policy-wrapping dispatch pipeline.
///
/// Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Router {
    inner: Arc<Inner>,
}

impl Router {
    /// Create a router over the given policy components.
    pub fn new(rate_limiter: Arc<RateLimiter>, authorizer: Arc<Authorizer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry {
                    by_name: HashMap::new(),
                    order: Vec::new(),
                }),
                handler: RwLock::new(None),
                rate_limiter,
                authorizer,
                audit: RwLock::new(None),
            }),
        }
    }

    /// Attach the audit logger. Refusals are recorded from then on.
    pub fn attach_audit(&self, audit: Arc<AuditLogger>) {
        if let Ok(mut guard) = self.inner.audit.write() {
            *guard = Some(audit);
        }
    }

    /// Register an adapter under its own tag.
    pub fn register(&self, adapter: Arc<dyn PlatformAdapter>) -> RouterResult<()> {
        let name = adapter.name().to_string();
        let mut guard = self
            .inner
            .registry
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.by_name.contains_key(&name) {
            return Err(RouterError::DuplicateAdapter(name));
        }
        guard.order.push(name.clone());
        guard.by_name.insert(name, adapter);
        Ok(())
    }

    /// Install the application handler invoked after policy checks.
    pub fn set_handler(&self, handler: MessageHandler) {
        if let Ok(mut guard) = self.inner.handler.write() {
            *guard = Some(handler);
        }
    }

    /// Registered platform tags in registration order.
    pub fn platforms(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .map_or_else(|_| Vec::new(), |g| g.order.clone())
    }

    /// Start every adapter in registration order, installing the wrapping
    /// handler on each first.
    pub async fn start(&self, ctx: CancellationToken) -> RouterResult<()> {
        if self.inner.handler.read().map_or(true, |g| g.is_none()) {
            return Err(RouterError::HandlerMissing);
        }

        let adapters: Vec<Arc<dyn PlatformAdapter>> = {
            let guard = self
                .inner
                .registry
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard
                .order
                .iter()
                .filter_map(|name| guard.by_name.get(name).cloned())
                .collect()
        };

        for adapter in adapters {
            adapter.set_handler(self.wrapping_handler());
            adapter.start(ctx.child_token()).await?;
            info!(platform = adapter.name(), "adapter started");
        }
        Ok(())
    }

    /// Stop all adapters concurrently, bounded by [`STOP_DEADLINE`].
    pub async fn stop(&self) -> RouterResult<()> {
        let adapters: Vec<Arc<dyn PlatformAdapter>> = {
            let guard = self
                .inner
                .registry
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.by_name.values().cloned().collect()
        };

        let stops = adapters.iter().map(|a| a.stop());
        match tokio::time::timeout(STOP_DEADLINE, futures::future::join_all(stops)).await {
            Ok(results) => {
                for (adapter, result) in adapters.iter().zip(results) {
                    if let Err(e) = result {
                        warn!(platform = adapter.name(), error = %e, "adapter stop failed");
                    }
                }
            },
            Err(_) => {
                warn!(
                    deadline_secs = STOP_DEADLINE.as_secs(),
                    "adapter shutdown missed its deadline"
                );
            },
        }
        Ok(())
    }

    /// Send `text` to a chat on the adapter owning `platform`.
    pub async fn send(&self, platform: &str, chat_id: &str, text: &str) -> RouterResult<()> {
        let adapter = {
            let guard = self
                .inner
                .registry
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard
                .by_name
                .get(platform)
                .cloned()
                .ok_or_else(|| RouterError::UnknownPlatform(platform.to_string()))?
        };
        adapter.send(chat_id, text).await?;
        Ok(())
    }

    /// A stable send closure for background tasks.
    ///
    /// Captured by the session manager at construction; the returned
    /// future resolves on the adapter's send path.
    pub fn send_fn(
        &self,
    ) -> Arc<
        dyn Fn(
                String,
                String,
                String,
            )
                -> std::pin::Pin<Box<dyn std::future::Future<Output = CoreResult<()>> + Send>>
            + Send
            + Sync,
    > {
        let router = self.clone();
        Arc::new(move |platform, chat_id, text| {
            let router = router.clone();
            Box::pin(async move {
                router
                    .send(&platform, &chat_id, &text)
                    .await
                    .map_err(|e| magabot_core::CoreError::Transport {
                        platform,
                        message: e.to_string(),
                    })
            })
        })
    }

    /// Build the policy pipeline installed on every adapter.
    fn wrapping_handler(&self) -> MessageHandler {
        let inner = self.inner.clone();
        Arc::new(move |ctx: CancellationToken, message: IncomingMessage| {
            let inner = inner.clone();
            reply_future(async move { inner.dispatch(ctx, message).await })
        })
    }
}

impl Inner {
    async fn dispatch(
        self: Arc<Self>,
        ctx: CancellationToken,
        message: IncomingMessage,
    ) -> CoreResult<String> {
        let user_hash = hash_user_id(&message.user_id);
        let rate_key = format!("{}:{}", message.platform, message.user_id);

        let allowed = if message.is_command() {
            self.rate_limiter.allow_command(&rate_key)
        } else {
            self.rate_limiter.allow_message(&rate_key)
        };
        if !allowed {
            self.audit_refusal(
                SecurityEventKind::RateLimited,
                &message.platform,
                &user_hash,
            );
            return Ok(RATE_LIMITED_REPLY.to_string());
        }

        if !self
            .authorizer
            .is_allowed(&message.platform, &message.user_id)
        {
            self.audit_refusal(
                SecurityEventKind::AccessDenied,
                &message.platform,
                &user_hash,
            );
            return Ok(UNAUTHORIZED_REPLY.to_string());
        }

        let handler = self
            .handler
            .read()
            .ok()
            .and_then(|g| g.clone())
            .ok_or(magabot_core::CoreError::HandlerMissing)?;
        handler(ctx, message).await
    }

    fn audit_refusal(&self, kind: SecurityEventKind, platform: &str, user_hash: &str) {
        if let Ok(guard) = self.audit.read() {
            if let Some(audit) = guard.as_ref() {
                audit.log_best_effort(
                    &SecurityEvent::new(kind, false)
                        .with_platform(platform)
                        .with_user(user_hash),
                );
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("platforms", &self.platforms())
            .finish()
    }
}
