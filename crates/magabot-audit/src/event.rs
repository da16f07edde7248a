//! Security event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The enumerated security event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// Successful authentication.
    AuthSuccess,
    /// Failed authentication attempt.
    AuthFailure,
    /// A client key entered lockout.
    AuthLockout,
    /// A conversation session was created.
    SessionCreated,
    /// A conversation session expired.
    SessionExpired,
    /// A session reference failed validation.
    SessionInvalid,
    /// Privileged administrative action.
    AdminAction,
    /// Configuration change.
    ConfigChange,
    /// A request was rate-limited.
    RateLimited,
    /// Authorization refused.
    AccessDenied,
    /// Encryption failure.
    EncryptError,
    /// Decryption failure.
    DecryptError,
    /// A server-side request was blocked as SSRF.
    SsrfBlocked,
    /// Input was sanitized before use.
    InputSanitized,
    /// Input looked hostile and was refused.
    SuspiciousInput,
}

impl SecurityEventKind {
    /// Default severity when the event does not carry one.
    pub fn default_severity(self) -> Severity {
        match self {
            Self::AuthLockout | Self::SsrfBlocked | Self::SuspiciousInput => Severity::Critical,
            Self::AuthFailure | Self::AccessDenied | Self::RateLimited => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine.
    Info,
    /// Needs attention.
    Warning,
    /// Security-relevant incident.
    Critical,
}

/// One security event, persisted as a single NDJSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Event type.
    pub event_type: SecurityEventKind,
    /// Transport tag, when platform-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Hashed user ID (never the raw identity).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Client IP, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// Whether the underlying operation succeeded.
    pub success: bool,
    /// Free-form context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Severity; inferred from the type when not set explicitly.
    pub severity: Severity,
    /// Correlates all events of one request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl SecurityEvent {
    /// Create an event of the given kind with inferred severity.
    pub fn new(event_type: SecurityEventKind, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            platform: None,
            user_id: None,
            ip: None,
            success,
            details: None,
            severity: event_type.default_severity(),
            request_id: None,
        }
    }

    /// Set the platform tag.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// Set the (already hashed) user ID.
    #[must_use]
    pub fn with_user(mut self, hashed_user_id: impl Into<String>) -> Self {
        self.user_id = Some(hashed_user_id.into());
        self
    }

    /// Set the client IP.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Set free-form details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Override the inferred severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the request correlation ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
