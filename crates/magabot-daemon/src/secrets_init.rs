//! Secrets manager construction and the config overlay table.

use std::sync::Arc;

use magabot_config::{Config, SecretsBackendKind};
use magabot_core::MagabotDirs;
use magabot_secrets::{
    ChainBackend, ClaudeCredsBackend, EnvBackend, HashiVaultBackend, LocalBackend, SecretBackend,
    SecretMapping, SecretsManager,
};
use tracing::warn;

use crate::error::DaemonResult;

/// Build the secrets manager selected by config.
///
/// The fallback is always a chain of the ambient read-only sources
/// (environment variables, Claude Code credentials), plus the local file
/// store when the primary is remote. For the HashiCorp Vault backend the
/// returned handle is the token-renewal watcher; the daemon aborts it on
/// shutdown.
pub fn build(
    config: &Config,
    dirs: &MagabotDirs,
) -> DaemonResult<(SecretsManager, Option<tokio::task::JoinHandle<()>>)> {
    let mut fallback_links: Vec<Arc<dyn SecretBackend>> = vec![Arc::new(EnvBackend::new())];
    match ClaudeCredsBackend::new() {
        Ok(backend) => fallback_links.push(Arc::new(backend)),
        Err(e) => warn!(error = %e, "claude credentials backend unavailable"),
    }

    let mut renewal = None;
    let primary: Arc<dyn SecretBackend> = match config.secrets.backend {
        SecretsBackendKind::Local => Arc::new(LocalBackend::open(&dirs.secrets_file)?),
        SecretsBackendKind::Env => Arc::new(EnvBackend::new()),
        SecretsBackendKind::Vault => {
            // Remote primary: keep the local file reachable as a fallback.
            fallback_links.push(Arc::new(LocalBackend::open(&dirs.secrets_file)?));
            let backend = HashiVaultBackend::new(
                &config.secrets.vault_addr,
                &config.secrets.vault_token,
                &config.secrets.vault_mount,
            )?;
            renewal = Some(backend.spawn_token_renewal());
            Arc::new(backend)
        },
    };

    let manager = SecretsManager::new(primary)
        .with_fallback(Arc::new(ChainBackend::new(fallback_links)));
    Ok((manager, renewal))
}

/// The secret-key-to-config-field table walked at startup.
///
/// A populated config field always wins over a stored secret.
pub fn mappings() -> Vec<SecretMapping<Config>> {
    vec![
        SecretMapping {
            key: "magabot/llm/anthropic_api_key",
            label: "Anthropic API key",
            field: |c| &mut c.llm.anthropic_api_key,
        },
        SecretMapping {
            key: "magabot/llm/openai_api_key",
            label: "OpenAI API key",
            field: |c| &mut c.llm.openai_api_key,
        },
        SecretMapping {
            key: "magabot/telegram/bot_token",
            label: "Telegram bot token",
            field: |c| &mut c.telegram.bot_token,
        },
        SecretMapping {
            key: "magabot/slack/bot_token",
            label: "Slack bot token",
            field: |c| &mut c.slack.bot_token,
        },
        SecretMapping {
            key: "magabot/slack/app_token",
            label: "Slack app token",
            field: |c| &mut c.slack.app_token,
        },
        SecretMapping {
            key: "magabot/whatsapp/access_token",
            label: "WhatsApp access token",
            field: |c| &mut c.whatsapp.access_token,
        },
        SecretMapping {
            key: "magabot/whatsapp/phone_number_id",
            label: "WhatsApp phone number ID",
            field: |c| &mut c.whatsapp.phone_number_id,
        },
        SecretMapping {
            key: "magabot/webhook/bearer_token",
            label: "Webhook bearer token",
            field: |c| &mut c.webhook.bearer_token,
        },
        SecretMapping {
            key: "magabot/webhook/hmac_secret",
            label: "Webhook HMAC secret",
            field: |c| &mut c.webhook.hmac_secret,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_backend_overlay_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = MagabotDirs::with_root(dir.path());
        let config = Config::default();

        let (manager, _renewal) = build(&config, &dirs).unwrap();
        manager
            .set("magabot/llm/anthropic_api_key", "sk-from-store")
            .await
            .unwrap();

        let mut config = Config::default();
        manager.overlay_config(&mut config, &mappings()).await;
        assert_eq!(config.llm.anthropic_api_key, "sk-from-store");
    }

    #[tokio::test]
    async fn config_value_beats_stored_secret() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = MagabotDirs::with_root(dir.path());
        let (manager, _renewal) = build(&Config::default(), &dirs).unwrap();
        manager
            .set("magabot/llm/anthropic_api_key", "sec")
            .await
            .unwrap();

        let mut config = Config::default();
        config.llm.anthropic_api_key = "cfg".to_string();
        manager.overlay_config(&mut config, &mappings()).await;
        assert_eq!(config.llm.anthropic_api_key, "cfg");
    }

    #[tokio::test]
    async fn both_empty_still_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = MagabotDirs::with_root(dir.path());
        let (manager, _renewal) = build(&Config::default(), &dirs).unwrap();

        let mut config = Config::default();
        let loaded = manager.overlay_config(&mut config, &mappings()).await;
        assert!(config.llm.anthropic_api_key.is_empty());
        // Nothing anywhere is not an error.
        let _ = loaded;
    }

    #[test]
    fn every_mapping_key_is_namespaced() {
        for mapping in mappings() {
            assert!(mapping.key.starts_with("magabot/"), "{}", mapping.key);
        }
    }
}
