//! # peerchat-client
//!
//! Accounts, conversations and groups on top of the local store, and the
//! sync engine that keeps the store in step with a connected peer.

pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod state;
pub mod sync;

use tracing_subscriber::{fmt, EnvFilter};

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use events::{Delivery, Outbound, SyncEvent};
pub use state::{AppState, SharedDb};
pub use sync::SyncEngine;

const DEFAULT_LOG_FILTER: &str =
    "peerchat=info,peerchat_client=debug,peerchat_net=debug,peerchat_store=info,warn";

/// Install the global subscriber. Honours `RUST_LOG`; logs go to stderr so
/// they do not interleave with the chat prompt.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
