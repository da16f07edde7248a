//! The request pipeline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::Response;
use axum::routing::{any, get};
use magabot_audit::{AuditLogger, SecurityEvent, SecurityEventKind};
use magabot_config::WebhookConfig;
use magabot_core::adapter::HandlerSlot;
use magabot_core::identity::hash_user_id;
use magabot_core::message::IncomingMessage;
use magabot_security::{FailureTracker, NonceCache, RateLimiter};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::auth::{AuthOutcome, authenticate};
use crate::ip;
use crate::payload::canonicalize;

/// Accepted clock skew for the `X-Timestamp` check.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Handler-side timeout for one request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the pipeline needs, shared across requests.
pub(crate) struct WebhookState {
    pub(crate) config: WebhookConfig,
    pub(crate) slot: HandlerSlot,
    pub(crate) failures: FailureTracker,
    pub(crate) nonces: NonceCache,
    pub(crate) ip_limiter: RateLimiter,
    pub(crate) user_limiter: RateLimiter,
    pub(crate) audit: std::sync::RwLock<Option<Arc<AuditLogger>>>,
    pub(crate) ctx: CancellationToken,
}

impl WebhookState {
    pub(crate) fn new(config: WebhookConfig) -> Self {
        let window = Duration::from_millis(config.rate_limit_window_ms);
        Self {
            failures: FailureTracker::new(
                config.max_auth_failures,
                Duration::from_millis(config.auth_lockout_ms),
            ),
            nonces: NonceCache::new(
                Duration::from_secs(config.nonce_ttl_secs),
                config.nonce_max_entries,
            ),
            ip_limiter: RateLimiter::new(config.rate_limit_per_ip, 0, window),
            user_limiter: RateLimiter::new(config.rate_limit_per_user, 0, window),
            slot: HandlerSlot::new(),
            audit: std::sync::RwLock::new(None),
            ctx: CancellationToken::new(),
            config,
        }
    }

    fn audit_event(&self, event: SecurityEvent) {
        if let Ok(guard) = self.audit.read() {
            if let Some(audit) = guard.as_ref() {
                audit.log_best_effort(&event.with_platform("webhook"));
            }
        }
    }
}

/// Build the axum application for this receiver.
pub(crate) fn build_router(state: Arc<WebhookState>) -> Router {
    let path = state.config.path.clone();
    Router::new()
        .route(&path, any(handle_webhook))
        .route("/health", get(handle_health))
        .layer(tower_http::timeout::TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

/// One response constructor so no path can skip the security headers.
fn respond(
    status: StatusCode,
    request_id: &str,
    body: serde_json::Value,
    retry_after: Option<Duration>,
) -> Response {
    let mut builder = Response::builder()
        .status(status)
        .header("x-request-id", request_id)
        .header("x-content-type-options", "nosniff")
        .header("x-frame-options", "DENY")
        .header(header::CACHE_CONTROL, "no-store")
        .header("content-security-policy", "default-src 'none'")
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(wait) = retry_after {
        let secs = wait.as_secs().max(1);
        builder = builder.header(header::RETRY_AFTER, secs);
    }

    builder
        .body(axum::body::Body::from(body.to_string()))
        .unwrap_or_else(|_| {
            let mut fallback = Response::new(axum::body::Body::empty());
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

fn error_body(message: &str, request_id: &str) -> serde_json::Value {
    json!({ "ok": false, "error": message, "request_id": request_id })
}

#[allow(clippy::too_many_lines)]
async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    // The TCP peer is the only trusted address; forwarding headers are
    // spoofable and deliberately ignored.
    let peer_ip = peer.ip();
    let ip_key = peer_ip.to_string();

    // 1. Method.
    if method != Method::POST {
        return respond(
            StatusCode::METHOD_NOT_ALLOWED,
            &request_id,
            error_body("method not allowed", &request_id),
            None,
        );
    }

    // 2. Direct-peer IP allow-list.
    if !ip::allowed(peer_ip, &state.config.allowed_ips) {
        state.audit_event(
            SecurityEvent::new(SecurityEventKind::AccessDenied, false)
                .with_ip(&ip_key)
                .with_details("peer IP not allowed")
                .with_request_id(&request_id),
        );
        return respond(
            StatusCode::FORBIDDEN,
            &request_id,
            error_body("forbidden", &request_id),
            None,
        );
    }

    // 4. Lockout gate, ahead of auth so locked peers cannot burn auth
    //    cycles.
    if let Some(remaining) = state.failures.is_locked(&ip_key) {
        state.audit_event(
            SecurityEvent::new(SecurityEventKind::AuthLockout, false)
                .with_ip(&ip_key)
                .with_request_id(&request_id),
        );
        return respond(
            StatusCode::TOO_MANY_REQUESTS,
            &request_id,
            error_body("locked out", &request_id),
            Some(remaining),
        );
    }

    // 5. Authentication.
    let auth_identity = match authenticate(&state.config, &headers, &body) {
        AuthOutcome::Identified(identity) => Some(identity),
        AuthOutcome::Anonymous => None,
        AuthOutcome::Rejected => {
            state.failures.record_failure(&ip_key);
            state.audit_event(
                SecurityEvent::new(SecurityEventKind::AuthFailure, false)
                    .with_ip(&ip_key)
                    .with_request_id(&request_id),
            );
            return respond(
                StatusCode::UNAUTHORIZED,
                &request_id,
                error_body("unauthorized", &request_id),
                None,
            );
        },
    };

    // 6. Body size.
    if body.len() > state.config.max_body_size {
        return respond(
            StatusCode::BAD_REQUEST,
            &request_id,
            error_body("body too large", &request_id),
            None,
        );
    }

    // 7. Timestamp freshness.
    if state.config.require_timestamp {
        let fresh = headers
            .get("x-timestamp")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .is_some_and(|ts| (chrono::Utc::now().timestamp() - ts).abs() <= TIMESTAMP_TOLERANCE_SECS);
        if !fresh {
            return respond(
                StatusCode::BAD_REQUEST,
                &request_id,
                error_body("missing or stale timestamp", &request_id),
                None,
            );
        }
    }

    // 8. Nonce replay.
    if state.config.require_nonce {
        let Some(nonce) = headers.get("x-nonce").and_then(|v| v.to_str().ok()) else {
            return respond(
                StatusCode::BAD_REQUEST,
                &request_id,
                error_body("missing nonce", &request_id),
                None,
            );
        };
        if !state.nonces.check_and_insert(nonce) {
            state.audit_event(
                SecurityEvent::new(SecurityEventKind::SuspiciousInput, false)
                    .with_ip(&ip_key)
                    .with_details("nonce replay")
                    .with_request_id(&request_id),
            );
            return respond(
                StatusCode::CONFLICT,
                &request_id,
                error_body("duplicate nonce", &request_id),
                None,
            );
        }
    }

    // 9. Payload canonicalisation.
    let Some(payload) = canonicalize(&body) else {
        return respond(
            StatusCode::BAD_REQUEST,
            &request_id,
            error_body("missing message", &request_id),
            None,
        );
    };

    // 10. Identity resolution. A mapped credential overrides everything;
    //     the payload's own claim ranks below the X-User-ID header.
    let header_identity = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
    };
    let identity = auth_identity
        .or_else(|| header_identity("x-user-id"))
        .or(payload.identity)
        .or_else(|| header_identity("x-webhook-source"));
    let Some(identity) = identity else {
        return respond(
            StatusCode::FORBIDDEN,
            &request_id,
            error_body("no identity", &request_id),
            None,
        );
    };

    // 11. User allow-list.
    if !user_allowed(&identity, &state.config.allowed_users) {
        state.audit_event(
            SecurityEvent::new(SecurityEventKind::AccessDenied, false)
                .with_ip(&ip_key)
                .with_user(hash_user_id(&identity))
                .with_request_id(&request_id),
        );
        return respond(
            StatusCode::FORBIDDEN,
            &request_id,
            error_body("user not allowed", &request_id),
            None,
        );
    }

    // 12. Per-IP rate limit.
    if !state.ip_limiter.allow_message(&ip_key) {
        state.audit_event(
            SecurityEvent::new(SecurityEventKind::RateLimited, false)
                .with_ip(&ip_key)
                .with_request_id(&request_id),
        );
        return respond(
            StatusCode::TOO_MANY_REQUESTS,
            &request_id,
            error_body("rate limited", &request_id),
            Some(state.ip_limiter.retry_after(&ip_key)),
        );
    }

    // 13. Per-user rate limit, independent of the source IP.
    if !state.user_limiter.allow_message(&identity) {
        state.audit_event(
            SecurityEvent::new(SecurityEventKind::RateLimited, false)
                .with_ip(&ip_key)
                .with_user(hash_user_id(&identity))
                .with_request_id(&request_id),
        );
        return respond(
            StatusCode::TOO_MANY_REQUESTS,
            &request_id,
            error_body("rate limited", &request_id),
            Some(state.user_limiter.retry_after(&identity)),
        );
    }

    // 14. Dispatch.
    state.failures.clear(&ip_key);
    state.audit_event(
        SecurityEvent::new(SecurityEventKind::AuthSuccess, true)
            .with_ip(&ip_key)
            .with_user(hash_user_id(&identity))
            .with_request_id(&request_id),
    );

    let message = IncomingMessage::new("webhook", ip_key.clone(), identity, payload.text)
        .with_raw(serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null));

    match state.slot.dispatch(state.ctx.child_token(), message).await {
        Ok(reply) => respond(
            StatusCode::OK,
            &request_id,
            json!({
                "ok": true,
                "response": reply.unwrap_or_default(),
                "request_id": request_id,
            }),
            None,
        ),
        Err(e) => {
            warn!(error = %e, "webhook handler failed");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                &request_id,
                error_body("handler error", &request_id),
                None,
            )
        },
    }
}

/// Literal match or `prefix:*` wildcard; empty list admits everyone.
fn user_allowed(identity: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    allowed.iter().any(|entry| {
        if entry == identity {
            return true;
        }
        entry.strip_suffix(":*").is_some_and(|prefix| {
            identity.starts_with(prefix) && identity[prefix.len()..].starts_with(':')
        })
    })
}

async fn handle_health(
    State(_state): State<Arc<WebhookState>>,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    if params.get("metrics").map(String::as_str) == Some("true") {
        return respond(StatusCode::OK, &request_id, runtime_metrics(), None);
    }

    let mut response = respond(StatusCode::OK, &request_id, json!("OK"), None);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    *response.body_mut() = axum::body::Body::from("OK");
    response
}

/// Best-effort process stats for dashboards.
///
/// Field names are kept stable for existing scrapers; allocator internals
/// are not exposed by the runtime, so the heap figures read zero.
fn runtime_metrics() -> serde_json::Value {
    let workers = tokio::runtime::Handle::try_current()
        .map(|h| h.metrics().num_workers())
        .unwrap_or(0);
    json!({
        "status": "ok",
        "tasks": workers,
        "heap_alloc": 0,
        "heap_sys": 0,
        "gc_cycles": 0,
        "runtime_version": env!("CARGO_PKG_VERSION"),
    })
}
