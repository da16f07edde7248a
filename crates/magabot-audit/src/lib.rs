//! Security event logging.
//!
//! Records go to an append-only newline-delimited JSON file. The writer is
//! mutex-protected; a rotation check runs on every write so the file never
//! grows past the configured bound. Rotated files keep a
//! `.YYYYMMDD-HHMMSS` suffix beside the live log.
//!
//! User IDs in events are expected to be pre-hashed by the caller (see
//! `magabot_core::hash_user_id`); this crate never sees raw identities.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::must_use_candidate)]

mod error;
mod event;
mod logger;

pub use error::{AuditError, AuditResult};
pub use event::{SecurityEvent, SecurityEventKind, Severity};
pub use logger::AuditLogger;
