//! Privacy-preserving user identifiers for logs and audit records.

use sha2::{Digest, Sha256};

/// Hash a platform user ID for logging.
///
/// Raw user IDs never reach the audit log or tracing output; this produces
/// a stable 16-hex-character digest prefix instead.
pub fn hash_user_id(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    hex::encode(&digest[..8])
}
