//! # peerchat-store
//!
//! The device-local store: users, conversations, groups and messages kept in
//! a SQLite database. Each device owns its own copy; nothing here talks to
//! the network. The crate exposes a synchronous [`Database`] handle with
//! typed helpers per record kind.

pub mod conversations;
pub mod database;
pub mod groups;
pub mod messages;
pub mod migrations;
pub mod session;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use peerchat_shared::models::{Conversation, Group, Message, User};
