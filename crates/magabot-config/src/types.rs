//! Configuration tree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// LLM provider settings.
    pub llm: LlmConfig,
    /// Telegram transport.
    pub telegram: TelegramConfig,
    /// Slack transport.
    pub slack: SlackConfig,
    /// WhatsApp transport.
    pub whatsapp: WhatsAppConfig,
    /// Inbound webhook receiver.
    pub webhook: WebhookConfig,
    /// Allow-lists and chat rate limits.
    pub security: SecurityConfig,
    /// Conversation sessions.
    pub session: SessionConfig,
    /// Security audit log.
    pub audit: AuditConfig,
    /// Secrets manager.
    pub secrets: SecretsConfig,
    /// Shutdown backups.
    pub backup: BackupConfig,
    /// Log filtering.
    pub logging: LoggingConfig,
}

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Default provider name (`anthropic` or `openai`).
    pub provider: String,
    /// Anthropic API key; empty means "resolve from secrets".
    pub anthropic_api_key: String,
    /// OpenAI-compatible API key; empty means "resolve from secrets".
    pub openai_api_key: String,
    /// Model identifier passed to the provider.
    pub model: String,
    /// Completion token budget.
    pub max_tokens: usize,
    /// Optional API base override (self-hosted gateways).
    pub base_url: Option<String>,
    /// System prompt prepended to every conversation.
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            base_url: None,
            system_prompt: "You are a helpful assistant reachable over chat.".to_string(),
        }
    }
}

/// Telegram transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether the adapter is registered at startup.
    pub enabled: bool,
    /// Bot API token; empty means "resolve from secrets".
    pub bot_token: String,
    /// Long-poll timeout passed to `getUpdates`, in seconds.
    pub poll_timeout_secs: u32,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            poll_timeout_secs: 30,
        }
    }
}

/// Slack transport settings (Socket Mode).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Whether the adapter is registered at startup.
    pub enabled: bool,
    /// Bot token (`xoxb-…`) used for the Web API.
    pub bot_token: String,
    /// App-level token (`xapp-…`) used to open the socket.
    pub app_token: String,
}

/// WhatsApp transport settings (Business Cloud API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Whether the adapter is registered at startup.
    pub enabled: bool,
    /// Graph API access token.
    pub access_token: String,
    /// Sending phone number ID.
    pub phone_number_id: String,
    /// Graph API base URL.
    pub api_base: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            phone_number_id: String::new(),
            api_base: "https://graph.facebook.com/v20.0".to_string(),
        }
    }
}

/// Webhook authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// No authentication; identity comes from the payload. Insecure —
    /// only for trusted networks.
    None,
    /// `Authorization: Bearer <token>`.
    Bearer,
    /// HTTP Basic; identity is the username.
    Basic,
    /// HMAC-SHA256 signature over the raw body.
    Hmac,
}

/// Inbound webhook receiver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Whether the receiver is registered at startup.
    pub enabled: bool,
    /// Bind address.
    pub bind_addr: String,
    /// Listen port.
    pub port: u16,
    /// POST path.
    pub path: String,
    /// Authentication mode.
    pub auth_method: AuthMethod,
    /// Legacy single shared bearer token.
    pub bearer_token: String,
    /// Token → identity map; takes precedence over `bearer_token`.
    pub bearer_tokens: HashMap<String, String>,
    /// Username → password map for basic auth.
    pub basic_users: HashMap<String, String>,
    /// Legacy single HMAC secret.
    pub hmac_secret: String,
    /// Identity → secret map; takes precedence over `hmac_secret`.
    pub hmac_secrets: HashMap<String, String>,
    /// Exact IPs or CIDR blocks allowed to connect; empty = any peer.
    pub allowed_ips: Vec<String>,
    /// Identities allowed to post; empty = any. `prefix:*` wildcards
    /// match colon-prefixed identities.
    pub allowed_users: Vec<String>,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Require an `X-Timestamp` header within ±5 minutes.
    pub require_timestamp: bool,
    /// Require a single-use `X-Nonce` header.
    pub require_nonce: bool,
    /// Nonce TTL in seconds.
    pub nonce_ttl_secs: u64,
    /// Bound on remembered nonces.
    pub nonce_max_entries: usize,
    /// Per-IP requests per window; 0 disables.
    pub rate_limit_per_ip: usize,
    /// Per-identity requests per window; 0 disables.
    pub rate_limit_per_user: usize,
    /// Rate-limit window in milliseconds.
    pub rate_limit_window_ms: u64,
    /// Auth failures before a peer IP is locked out; 0 disables.
    pub max_auth_failures: usize,
    /// Lockout duration in milliseconds.
    pub auth_lockout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: "127.0.0.1".to_string(),
            port: 8844,
            path: "/webhook".to_string(),
            auth_method: AuthMethod::Bearer,
            bearer_token: String::new(),
            bearer_tokens: HashMap::new(),
            basic_users: HashMap::new(),
            hmac_secret: String::new(),
            hmac_secrets: HashMap::new(),
            allowed_ips: Vec::new(),
            allowed_users: Vec::new(),
            max_body_size: 1024 * 1024,
            require_timestamp: false,
            require_nonce: false,
            nonce_ttl_secs: 300,
            nonce_max_entries: 10_000,
            rate_limit_per_ip: 60,
            rate_limit_per_user: 30,
            rate_limit_window_ms: 60_000,
            max_auth_failures: 5,
            auth_lockout_ms: 300_000,
        }
    }
}

/// Chat-side policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Per-platform allowed user IDs. A platform listed with an empty
    /// list allows everyone on it; an unlisted platform denies everyone.
    pub allowed_users: HashMap<String, Vec<String>>,
    /// Messages per user per minute; 0 disables.
    pub rate_limit_messages: usize,
    /// Commands per user per minute; 0 disables.
    pub rate_limit_commands: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_users: HashMap::new(),
            rate_limit_messages: 20,
            rate_limit_commands: 10,
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bound on per-chat history length.
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_history: 50 }
    }
}

/// Audit log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Whether the audit logger is attached.
    pub enabled: bool,
    /// Rotation threshold in MiB.
    pub max_size_mb: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size_mb: 50,
        }
    }
}

/// Which backend the secrets manager builds as primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretsBackendKind {
    /// Encrypted `secrets.json` next to the config.
    Local,
    /// HashiCorp Vault KV v2.
    Vault,
    /// Environment variables only.
    Env,
}

/// Secrets manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Primary backend.
    pub backend: SecretsBackendKind,
    /// HashiCorp Vault address (when `backend = vault`).
    pub vault_addr: String,
    /// HashiCorp Vault token.
    pub vault_token: String,
    /// KV v2 mount point.
    pub vault_mount: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            backend: SecretsBackendKind::Local,
            vault_addr: String::new(),
            vault_token: String::new(),
            vault_mount: "secret".to_string(),
        }
    }
}

/// Shutdown backup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Create a backup of the data directory on shutdown.
    pub on_shutdown: bool,
    /// How many backup archives to keep.
    pub keep: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            on_shutdown: true,
            keep: 5,
        }
    }
}

/// Log filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn,magabot=info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.webhook.max_body_size, 1024 * 1024);
        assert_eq!(config.webhook.auth_method, AuthMethod::Bearer);
        assert_eq!(config.session.max_history, 50);
        assert!(config.backup.on_shutdown);
        assert_eq!(config.secrets.backend, SecretsBackendKind::Local);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = r"
telegram:
  enabled: true
  bot_token: tok
webhook:
  enabled: true
  auth_method: hmac
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.telegram.enabled);
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.webhook.auth_method, AuthMethod::Hmac);
        assert_eq!(config.webhook.port, 8844);
    }

    #[test]
    fn auth_method_snake_case() {
        let config: Config =
            serde_yaml::from_str("webhook:\n  auth_method: none\n").unwrap();
        assert_eq!(config.webhook.auth_method, AuthMethod::None);
    }

    #[test]
    fn round_trips_through_yaml() {
        let mut config = Config::default();
        config
            .security
            .allowed_users
            .insert("telegram".to_string(), vec!["123".to_string()]);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.security.allowed_users["telegram"], vec!["123"]);
    }
}
