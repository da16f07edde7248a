//! The inbound webhook receiver.
//!
//! An HTTP server that is itself a platform adapter: events arrive as
//! `POST` requests, pass a fixed, ordered defense pipeline, and reach the
//! same handler every other transport feeds. Stages run cheapest-first,
//! and each one establishes trust for the next:
//!
//! 1. method check → 2. direct-peer IP allow-list → 4. lockout gate →
//! 5. authentication → 6. body size → 7. timestamp freshness →
//! 8. nonce replay → 9. payload canonicalisation → 10. identity
//! resolution → 11. user allow-list → 12. per-IP rate limit →
//! 13. per-user rate limit → 14. dispatch.
//!
//! The peer address from the TCP connection is the only trusted IP;
//! `X-Forwarded-For` and `X-Real-IP` are never read. All token and
//! signature comparisons are constant-time. Every response carries the
//! security header set (`X-Request-ID`, `X-Content-Type-Options`,
//! `X-Frame-Options`, `Cache-Control`, `Content-Security-Policy`).

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::missing_errors_doc)]

mod adapter;
mod auth;
mod ip;
mod payload;
mod server;

pub use adapter::WebhookAdapter;
pub use auth::sign_body;
