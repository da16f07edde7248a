//! Request authentication.
//!
//! Four modes, selected statically by config. Bearer and HMAC each have
//! two sub-modes: a map that resolves the credential to an identity, and a
//! legacy single shared credential that only authenticates. Every
//! comparison of secret material goes through [`constant_time_eq`].

use axum::http::HeaderMap;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use magabot_config::{AuthMethod, WebhookConfig};
use sha2::Sha256;
use subtle::ConstantTimeEq as _;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of the authentication stage.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AuthOutcome {
    /// Authenticated; the credential resolved to an identity.
    Identified(String),
    /// Authenticated; identity must come from elsewhere.
    Anonymous,
    /// Not authenticated.
    Rejected,
}

/// Constant-time equality over byte strings.
///
/// Length is compared first (length is not secret); the content compare
/// never short-circuits.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Run the configured authentication mode against a request.
pub(crate) fn authenticate(
    config: &WebhookConfig,
    headers: &HeaderMap,
    body: &[u8],
) -> AuthOutcome {
    match config.auth_method {
        AuthMethod::None => AuthOutcome::Anonymous,
        AuthMethod::Bearer => bearer(config, headers),
        AuthMethod::Basic => basic(config, headers),
        AuthMethod::Hmac => hmac_signature(config, headers, body),
    }
}

fn bearer(config: &WebhookConfig, headers: &HeaderMap) -> AuthOutcome {
    let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return AuthOutcome::Rejected;
    };

    if !config.bearer_tokens.is_empty() {
        // Token-to-identity map: the payload identity is ignored later.
        for (known, identity) in &config.bearer_tokens {
            if constant_time_eq(known.as_bytes(), token.as_bytes()) {
                return AuthOutcome::Identified(identity.clone());
            }
        }
        return AuthOutcome::Rejected;
    }

    if !config.bearer_token.is_empty()
        && constant_time_eq(config.bearer_token.as_bytes(), token.as_bytes())
    {
        return AuthOutcome::Anonymous;
    }
    AuthOutcome::Rejected
}

fn basic(config: &WebhookConfig, headers: &HeaderMap) -> AuthOutcome {
    let Some(encoded) = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
    else {
        return AuthOutcome::Rejected;
    };
    let Ok(decoded) = BASE64.decode(encoded) else {
        return AuthOutcome::Rejected;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return AuthOutcome::Rejected;
    };
    let Some((user, password)) = decoded.split_once(':') else {
        return AuthOutcome::Rejected;
    };

    match config.basic_users.get(user) {
        Some(expected) if constant_time_eq(expected.as_bytes(), password.as_bytes()) => {
            AuthOutcome::Identified(user.to_string())
        },
        _ => AuthOutcome::Rejected,
    }
}

fn hmac_signature(config: &WebhookConfig, headers: &HeaderMap, body: &[u8]) -> AuthOutcome {
    let Some(signature) = headers
        .get("x-hub-signature-256")
        .or_else(|| headers.get("x-signature"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("sha256="))
    else {
        return AuthOutcome::Rejected;
    };
    let Ok(signature) = hex::decode(signature) else {
        return AuthOutcome::Rejected;
    };

    if !config.hmac_secrets.is_empty() {
        for (identity, secret) in &config.hmac_secrets {
            if verify(secret, body, &signature) {
                return AuthOutcome::Identified(identity.clone());
            }
        }
        return AuthOutcome::Rejected;
    }

    if !config.hmac_secret.is_empty() && verify(&config.hmac_secret, body, &signature) {
        return AuthOutcome::Anonymous;
    }
    AuthOutcome::Rejected
}

fn verify(secret: &str, body: &[u8], signature: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    constant_time_eq(&mac.finalize().into_bytes(), signature)
}

/// Compute the `sha256=<hex>` signature for a body (used by tests and by
/// operators generating example requests).
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
