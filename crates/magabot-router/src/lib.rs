//! Central message dispatch.
//!
//! The [`Router`] owns every registered [`PlatformAdapter`] and the shared
//! application handler. At start it installs a wrapping handler on each
//! adapter that applies policy before the application sees a message:
//! rate limiting (separate budgets for `/`-commands and messages), the
//! per-platform allow-list, and audit logging of refusals. Outbound, it
//! fans `send` out to the adapter owning the platform tag, and exposes a
//! [`SendFn`]-shaped closure so background tasks can reach users after the
//! originating event has returned.
//!
//! [`SendFn`]: Router::send_fn

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::must_use_candidate)]

mod error;
mod router;

pub use error::{RouterError, RouterResult};
pub use router::{RATE_LIMITED_REPLY, Router, STOP_DEADLINE, UNAUTHORIZED_REPLY};
