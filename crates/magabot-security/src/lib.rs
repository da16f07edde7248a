//! Policy primitives for the magabot bridge.
//!
//! Four small, lock-protected structures sit on the inbound hot path:
//!
//! - [`Authorizer`] — per-platform user allow-lists
//! - [`RateLimiter`] — dual sliding windows (messages / commands) per key
//! - [`FailureTracker`] — auth-failure counting with temporary lockout
//! - [`NonceCache`] — single-use nonce registry with TTL and a size bound
//!
//! All four are synchronous: the critical sections are short enough that a
//! `std::sync` lock is cheaper than an async one.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::must_use_candidate)]

mod authorizer;
mod lockout;
mod nonce;
mod rate_limit;

pub use authorizer::Authorizer;
pub use lockout::FailureTracker;
pub use nonce::NonceCache;
pub use rate_limit::RateLimiter;
