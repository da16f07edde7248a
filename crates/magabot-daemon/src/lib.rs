//! The magabot daemon.
//!
//! Wires every subsystem together in a fixed startup order, owns the
//! signal loop (SIGHUP re-executes the binary, SIGINT/SIGTERM shut down),
//! and tears resources down in reverse order on every exit path.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![allow(clippy::missing_errors_doc)]

pub mod backup;
pub mod daemon;
pub mod error;
pub mod handler;
pub mod secrets_init;
pub mod storage;

pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
