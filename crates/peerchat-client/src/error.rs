use thiserror::Error;

use peerchat_net::NetError;
use peerchat_shared::error::ProtocolError;
use peerchat_store::StoreError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Invalid phone number {0}: expected +256 followed by 9 digits")]
    InvalidPhone(String),

    #[error("Avatar must be a single letter or digit")]
    InvalidAvatar,

    #[error("Username must not be empty")]
    EmptyUsername,

    #[error("A user with this phone number already exists")]
    PhoneTaken,

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Group name must not be empty")]
    EmptyGroupName,

    #[error("A group needs at least one other member")]
    NoGroupMembers,

    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Message too large: {size} bytes on the wire, limit is {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Unknown conversation or group: {0}")]
    UnknownChat(String),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Connection error: {0}")]
    Net(#[from] NetError),

    #[error("Payload error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
