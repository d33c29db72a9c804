//! # peerchat-shared
//!
//! Types shared by every peerchat crate: ids and their derivations, the
//! domain records kept in each device's local store, the payloads sent over
//! the peer channel, and the logged-in session.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod session;
pub mod types;

pub use error::ProtocolError;
pub use models::{Conversation, Group, Message, User};
pub use protocol::{ChannelPayload, ChatEnvelope};
pub use session::SessionContext;
pub use types::{ChatId, ConversationId, GroupId, MessageId, UserId};
