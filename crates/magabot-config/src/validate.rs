//! Configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{AuthMethod, Config, SecretsBackendKind};

/// Reject configurations the daemon cannot run with.
///
/// Secrets-shaped fields (tokens, keys) are deliberately not required
/// here: they may arrive later via the secrets overlay. Only structural
/// mistakes fail validation.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.session.max_history == 0 {
        return Err(invalid("session.max_history must be at least 1"));
    }

    if config.webhook.enabled {
        if config.webhook.port == 0 {
            return Err(invalid("webhook.port must be non-zero"));
        }
        if !config.webhook.path.starts_with('/') {
            return Err(invalid("webhook.path must start with '/'"));
        }
        if config.webhook.max_body_size == 0 {
            return Err(invalid("webhook.max_body_size must be non-zero"));
        }
        if config.webhook.rate_limit_window_ms == 0 {
            return Err(invalid("webhook.rate_limit_window_ms must be non-zero"));
        }
        match config.webhook.auth_method {
            AuthMethod::Basic if config.webhook.basic_users.is_empty() => {
                return Err(invalid(
                    "webhook.auth_method is basic but webhook.basic_users is empty",
                ));
            },
            _ => {},
        }
        for entry in &config.webhook.allowed_ips {
            validate_ip_entry(entry)?;
        }
    }

    if config.secrets.backend == SecretsBackendKind::Vault && config.secrets.vault_addr.is_empty()
    {
        return Err(invalid(
            "secrets.backend is vault but secrets.vault_addr is empty",
        ));
    }

    if config.backup.on_shutdown && config.backup.keep == 0 {
        return Err(invalid("backup.keep must be at least 1 when backups are on"));
    }

    Ok(())
}

/// An allow-list entry is either an exact IP or a CIDR block.
fn validate_ip_entry(entry: &str) -> ConfigResult<()> {
    if let Some((addr, prefix)) = entry.split_once('/') {
        let bits: u8 = prefix
            .parse()
            .map_err(|_| invalid(format!("bad CIDR prefix in webhook.allowed_ips: {entry}")))?;
        let max = if addr.parse::<std::net::Ipv6Addr>().is_ok() {
            128
        } else {
            32
        };
        if addr.parse::<std::net::IpAddr>().is_err() || bits > max {
            return Err(invalid(format!(
                "bad CIDR block in webhook.allowed_ips: {entry}"
            )));
        }
        return Ok(());
    }
    entry
        .parse::<std::net::IpAddr>()
        .map(|_| ())
        .map_err(|_| invalid(format!("bad IP in webhook.allowed_ips: {entry}")))
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}
