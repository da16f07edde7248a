//! Payload canonicalisation.
//!
//! Inbound bodies arrive in whatever shape the sending system produces.
//! Known shapes are probed in order — generic chat payloads, GitHub push
//! events, Grafana alerts — and anything else is treated as raw text.

/// Text plus the identity the payload itself claims, if any.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct CanonicalPayload {
    pub(crate) text: String,
    pub(crate) identity: Option<String>,
}

/// Keys probed for the generic shape, in order.
const GENERIC_TEXT_KEYS: &[&str] = &["message", "text", "content", "body", "msg"];

/// Extract `(text, identity)` from a request body.
///
/// Returns `None` when the body yields no usable text.
pub(crate) fn canonicalize(body: &[u8]) -> Option<CanonicalPayload> {
    let raw = std::str::from_utf8(body).ok()?;

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(raw) {
        // Generic: {"message": "..."} and friends.
        for key in GENERIC_TEXT_KEYS {
            if let Some(text) = json.get(*key).and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    let identity = json
                        .get("user_id")
                        .or_else(|| json.get("user"))
                        .and_then(|v| v.as_str())
                        .map(ToString::to_string);
                    return Some(CanonicalPayload {
                        text: text.to_string(),
                        identity,
                    });
                }
            }
        }

        // GitHub push: first commit message, sender login as identity.
        if let Some(commit_message) = json
            .pointer("/commits/0/message")
            .and_then(|v| v.as_str())
        {
            let identity = json
                .pointer("/sender/login")
                .and_then(|v| v.as_str())
                .map(|login| format!("github:{login}"));
            let repo = json
                .pointer("/repository/full_name")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            return Some(CanonicalPayload {
                text: format!("[{repo}] push: {commit_message}"),
                identity,
            });
        }

        // Grafana alert: title + state.
        if let (Some(title), Some(state)) = (
            json.get("title").and_then(|v| v.as_str()),
            json.get("state").and_then(|v| v.as_str()),
        ) {
            return Some(CanonicalPayload {
                text: format!("[grafana] {title}: {state}"),
                identity: Some("grafana".to_string()),
            });
        }
    }

    // Fallback: the raw body is the text; no identity claim.
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(CanonicalPayload {
        text: trimmed.to_string(),
        identity: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_message_key() {
        let out = canonicalize(br#"{"message": "hi", "user_id": "u1"}"#).unwrap();
        assert_eq!(out.text, "hi");
        assert_eq!(out.identity.as_deref(), Some("u1"));
    }

    #[test]
    fn generic_key_order() {
        // "message" wins over "text" when both are present.
        let out = canonicalize(br#"{"text": "second", "message": "first"}"#).unwrap();
        assert_eq!(out.text, "first");
    }

    #[test]
    fn generic_without_identity() {
        let out = canonicalize(br#"{"content": "note"}"#).unwrap();
        assert_eq!(out.text, "note");
        assert!(out.identity.is_none());
    }

    #[test]
    fn github_push_shape() {
        let body = br#"{
            "commits": [{"message": "fix race in watcher"}],
            "sender": {"login": "octocat"},
            "repository": {"full_name": "acme/infra"}
        }"#;
        let out = canonicalize(body).unwrap();
        assert_eq!(out.text, "[acme/infra] push: fix race in watcher");
        assert_eq!(out.identity.as_deref(), Some("github:octocat"));
    }

    #[test]
    fn grafana_alert_shape() {
        let out = canonicalize(br#"{"title": "High CPU", "state": "alerting"}"#).unwrap();
        assert_eq!(out.text, "[grafana] High CPU: alerting");
        assert_eq!(out.identity.as_deref(), Some("grafana"));
    }

    #[test]
    fn raw_text_fallback() {
        let out = canonicalize(b"deploy finished").unwrap();
        assert_eq!(out.text, "deploy finished");
        assert!(out.identity.is_none());
    }

    #[test]
    fn unmatched_json_falls_back_to_raw() {
        let out = canonicalize(br#"{"other": 1}"#).unwrap();
        assert_eq!(out.text, r#"{"other": 1}"#);
    }

    #[test]
    fn empty_body_is_none() {
        assert!(canonicalize(b"").is_none());
        assert!(canonicalize(b"   \n ").is_none());
    }

    #[test]
    fn empty_message_value_falls_through() {
        // An empty "message" is not usable text; the raw fallback applies.
        let out = canonicalize(br#"{"message": ""}"#).unwrap();
        assert_eq!(out.text, r#"{"message": ""}"#);
    }

    #[test]
    fn non_utf8_is_none() {
        assert!(canonicalize(&[0xff, 0xfe, 0x00]).is_none());
    }
}
