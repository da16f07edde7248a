//! Lifecycle orchestration.
//!
//! [`Daemon::build`] constructs every subsystem in dependency order;
//! [`Daemon::run`] starts the router, fires `on_start`, and blocks on the
//! signal loop. A hangup signal re-executes the current binary (a true
//! restart — the router's bounded stop releases the webhook port first);
//! interrupt and terminate run the shutdown sequence.
//!
//! Reload-on-hangup is unix-only. Elsewhere the signal loop supports
//! shutdown via ctrl-c alone; operators restart the process by hand.

use std::sync::Arc;
use std::time::Duration;

use magabot_adapters::{SlackAdapter, TelegramAdapter, WhatsAppAdapter};
use magabot_audit::{AuditLogger, SecurityEvent, SecurityEventKind};
use magabot_config::Config;
use magabot_core::MagabotDirs;
use magabot_crypto::Vault;
use magabot_hooks::HookManager;
use magabot_llm::{AnthropicProvider, LlmRouter, OpenAiCompatProvider, ProviderConfig};
use magabot_router::Router;
use magabot_security::{Authorizer, RateLimiter};
use magabot_session::SessionManager;
use magabot_webhook::WebhookAdapter;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::DaemonResult;
use crate::storage::Storage;
use crate::{backup, handler, secrets_init};

/// Window for the chat-side rate limiter.
const CHAT_RATE_WINDOW: Duration = Duration::from_secs(60);

/// What the signal loop decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalAction {
    /// Hangup: restart by re-executing the binary.
    Reload,
    /// Interrupt or terminate: shut down.
    Shutdown,
}

/// The wired-up application.
pub struct Daemon {
    config: Config,
    dirs: MagabotDirs,
    router: Router,
    hooks: HookManager,
    sessions: Arc<SessionManager>,
    audit: Option<Arc<AuditLogger>>,
    vault: Arc<Vault>,
    ctx: CancellationToken,
    vault_renewal: Option<tokio::task::JoinHandle<()>>,
}

impl Daemon {
    /// Construct every subsystem in startup order.
    ///
    /// Only configuration and construction failures are fatal; anything
    /// that can degrade (a missing LLM key, an unreachable secrets
    /// fallback) degrades with a warning instead.
    pub async fn build(mut config: Config, dirs: MagabotDirs) -> DaemonResult<Self> {
        // Secrets: build the manager, then overlay onto empty config
        // fields. Config-file values always win.
        let (secrets, vault_renewal) = secrets_init::build(&config, &dirs)?;
        secrets
            .overlay_config(&mut config, &secrets_init::mappings())
            .await;

        // Filesystem layout.
        for dir in dirs.required_dirs() {
            std::fs::create_dir_all(dir)?;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dirs.root, std::fs::Permissions::from_mode(0o700))?;
        }

        // At-rest crypto.
        let vault = Arc::new(Vault::load_or_create(&dirs.vault_key_file)?);

        // Storage.
        let storage = Arc::new(Storage::open(&dirs.data_dir.join("messages.db"))?);

        // Policy.
        let authorizer = Arc::new(Authorizer::new());
        for (platform, enabled) in [
            ("telegram", config.telegram.enabled),
            ("slack", config.slack.enabled),
            ("whatsapp", config.whatsapp.enabled),
            ("webhook", config.webhook.enabled),
        ] {
            if enabled {
                let users = config
                    .security
                    .allowed_users
                    .get(platform)
                    .cloned()
                    .unwrap_or_default();
                authorizer.set_allowed(platform, users);
            }
        }
        let rate_limiter = Arc::new(RateLimiter::new(
            config.security.rate_limit_messages,
            config.security.rate_limit_commands,
            CHAT_RATE_WINDOW,
        ));

        // LLM providers.
        let mut llm = LlmRouter::new();
        if !config.llm.anthropic_api_key.is_empty() {
            let provider_config =
                ProviderConfig::new(&config.llm.anthropic_api_key, &config.llm.model)
                    .max_tokens(config.llm.max_tokens)
                    .system_prompt(&config.llm.system_prompt);
            llm.register(Arc::new(AnthropicProvider::new(provider_config)));
        }
        if !config.llm.openai_api_key.is_empty() {
            let mut provider_config =
                ProviderConfig::new(&config.llm.openai_api_key, &config.llm.model)
                    .max_tokens(config.llm.max_tokens)
                    .system_prompt(&config.llm.system_prompt);
            if let Some(base) = &config.llm.base_url {
                provider_config = provider_config.base_url(base);
            }
            llm.register(Arc::new(OpenAiCompatProvider::new(provider_config)));
        }
        if llm.set_default(&config.llm.provider).is_err() {
            warn!(
                provider = %config.llm.provider,
                "configured LLM provider has no API key; replies will degrade"
            );
        }
        let llm = Arc::new(llm);

        // Router and audit.
        let router = Router::new(rate_limiter, authorizer);
        let audit = if config.audit.enabled {
            let logger = Arc::new(AuditLogger::open(&dirs.audit_log, config.audit.max_size_mb)?);
            router.attach_audit(logger.clone());
            Some(logger)
        } else {
            None
        };

        // Hooks.
        let hooks = HookManager::new();

        // Sessions close over the router's send path so background tasks
        // can notify users later.
        let sessions = Arc::new(SessionManager::new(
            config.session.max_history,
            router.send_fn(),
        ));

        // The application handler.
        router.set_handler(handler::build(
            sessions.clone(),
            llm,
            Some(storage.clone()),
        ));

        // Adapters.
        if config.telegram.enabled {
            router.register(Arc::new(TelegramAdapter::new(
                &config.telegram.bot_token,
                config.telegram.poll_timeout_secs,
                dirs.downloads_dir.clone(),
            )))?;
        }
        if config.slack.enabled {
            router.register(Arc::new(SlackAdapter::new(
                config.slack.bot_token.clone(),
                config.slack.app_token.clone(),
            )))?;
        }
        if config.whatsapp.enabled {
            router.register(Arc::new(WhatsAppAdapter::new(
                config.whatsapp.access_token.clone(),
                config.whatsapp.phone_number_id.clone(),
                config.whatsapp.api_base.clone(),
            )))?;
        }
        if config.webhook.enabled {
            let webhook = WebhookAdapter::new(config.webhook.clone());
            if let Some(audit) = &audit {
                webhook.attach_audit(audit.clone());
            }
            router.register(Arc::new(webhook))?;
        }

        Ok(Self {
            config,
            dirs,
            router,
            hooks,
            sessions,
            audit,
            vault,
            ctx: CancellationToken::new(),
            vault_renewal,
        })
    }

    /// Registered platform tags (diagnostics, `check-config`).
    pub fn platforms(&self) -> Vec<String> {
        self.router.platforms()
    }

    /// Session manager handle (used by scheduled background work).
    pub fn sessions(&self) -> Arc<SessionManager> {
        self.sessions.clone()
    }

    /// Start the router and block until a shutdown signal.
    pub async fn run(mut self) -> DaemonResult<()> {
        self.router.start(self.ctx.clone()).await?;
        info!(platforms = ?self.platforms(), "magabot daemon running");

        self.hooks
            .fire_and_forget("on_start", json!({ "platforms": self.platforms() }));

        loop {
            match wait_for_signal().await {
                SignalAction::Reload => {
                    info!("hangup received, restarting");
                    self.ctx.cancel();
                    if let Err(e) = self.router.stop().await {
                        warn!(error = %e, "router stop during reload failed");
                    }
                    // Only reachable when exec itself failed.
                    let e = reexec();
                    error!(error = %e, "re-exec failed, shutting down instead");
                    break;
                },
                SignalAction::Shutdown => break,
            }
        }

        self.shutdown().await
    }

    /// Ordered teardown; runs on every exit path out of `run`.
    async fn shutdown(&mut self) -> DaemonResult<()> {
        info!("shutting down");

        // A second interrupt skips the graceful path.
        tokio::spawn(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                error!("second interrupt, exiting immediately");
                std::process::exit(1);
            }
        });

        // Stop hooks run synchronously so they observe a live system.
        self.hooks.fire("on_stop", json!({})).await;

        self.ctx.cancel();
        if let Err(e) = self.router.stop().await {
            warn!(error = %e, "router stop failed");
        }

        if self.config.backup.on_shutdown {
            match backup::shutdown_backup(
                &self.dirs.data_dir,
                &self.dirs.backups_dir,
                self.config.backup.keep,
                Some(self.vault.clone()),
            ) {
                Ok(path) => info!(path = %path.display(), "shutdown backup complete"),
                Err(e) => warn!(error = %e, "shutdown backup failed"),
            }
        }

        if let Some(renewal) = self.vault_renewal.take() {
            renewal.abort();
        }

        if let Some(audit) = &self.audit {
            audit.log_best_effort(&SecurityEvent::new(SecurityEventKind::AdminAction, true)
                .with_details("daemon shutdown"));
            if let Err(e) = audit.flush() {
                warn!(error = %e, "audit flush failed");
            }
        }

        info!("shutdown complete");
        Ok(())
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> SignalAction {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGHUP handler");
            return SignalAction::Shutdown;
        },
    };
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            return SignalAction::Shutdown;
        },
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            return SignalAction::Shutdown;
        },
    };

    tokio::select! {
        _ = hangup.recv() => SignalAction::Reload,
        _ = interrupt.recv() => SignalAction::Shutdown,
        _ = terminate.recv() => SignalAction::Shutdown,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> SignalAction {
    // No hangup signal here, so no reload path either.
    let _ = tokio::signal::ctrl_c().await;
    SignalAction::Shutdown
}

/// Replace the current process with a fresh copy of the same binary,
/// preserving arguments and environment. Returns only on failure.
#[cfg(unix)]
fn reexec() -> std::io::Error {
    use std::os::unix::process::CommandExt;
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => return e,
    };
    std::process::Command::new(exe)
        .args(std::env::args_os().skip(1))
        .exec()
}

#[cfg(not(unix))]
fn reexec() -> std::io::Error {
    std::io::Error::other("reload is not supported on this platform")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> Config {
        // All transports disabled: build wires everything but starts no
        // network listeners.
        let mut config = Config::default();
        config.backup.on_shutdown = false;
        config
    }

    #[tokio::test]
    async fn builds_with_all_transports_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = MagabotDirs::with_root(dir.path().join("home"));
        let daemon = Daemon::build(quiet_config(), dirs).await.unwrap();
        assert!(daemon.platforms().is_empty());
    }

    #[tokio::test]
    async fn build_creates_the_filesystem_layout() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = MagabotDirs::with_root(dir.path().join("home"));
        let _daemon = Daemon::build(quiet_config(), dirs.clone()).await.unwrap();

        assert!(dirs.data_dir.exists());
        assert!(dirs.downloads_dir.exists());
        assert!(dirs.backups_dir.exists());
        assert!(dirs.vault_key_file.exists());
    }

    #[tokio::test]
    async fn enabled_webhook_is_registered() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = MagabotDirs::with_root(dir.path().join("home"));
        let mut config = quiet_config();
        config.webhook.enabled = true;

        let daemon = Daemon::build(config, dirs).await.unwrap();
        assert_eq!(daemon.platforms(), vec!["webhook".to_string()]);
    }

    #[tokio::test]
    async fn shutdown_backup_created_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = MagabotDirs::with_root(dir.path().join("home"));
        let mut config = Config::default();
        config.backup.on_shutdown = true;
        config.backup.keep = 2;

        let mut daemon = Daemon::build(config, dirs.clone()).await.unwrap();
        daemon.shutdown().await.unwrap();

        let backups: Vec<_> = std::fs::read_dir(&dirs.backups_dir)
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[tokio::test]
    async fn adapter_registration_respects_enable_flags() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = MagabotDirs::with_root(dir.path().join("home"));
        let mut config = quiet_config();
        config.telegram.enabled = true;
        config.telegram.bot_token = "123:abc".to_string();
        config.whatsapp.enabled = true;
        config.whatsapp.access_token = "tok".to_string();
        config.whatsapp.phone_number_id = "42".to_string();

        let daemon = Daemon::build(config, dirs).await.unwrap();
        let platforms = daemon.platforms();
        assert_eq!(platforms, vec!["telegram".to_string(), "whatsapp".to_string()]);
    }
}
