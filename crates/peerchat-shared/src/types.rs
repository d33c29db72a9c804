use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{
    CONVERSATION_ID_SEPARATOR, GROUP_ID_PREFIX, PHONE_COUNTRY_PREFIX, PHONE_DIGITS,
};

// User identity = phone number, e.g. "+256700000001"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(phone: impl Into<String>) -> Self {
        Self(phone.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `+256` followed by exactly nine digits.
    pub fn is_valid_phone(&self) -> bool {
        match self.0.strip_prefix(PHONE_COUNTRY_PREFIX) {
            Some(rest) => rest.len() == PHONE_DIGITS && rest.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }

    /// Last four characters, for log lines.
    pub fn short(&self) -> &str {
        self.0
            .char_indices()
            .rev()
            .nth(3)
            .map_or(&self.0[..], |(i, _)| &self.0[i..])
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two-party conversation key. Both devices compute the same value for the
/// same unordered pair of participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn between(a: &UserId, b: &UserId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!(
            "{}{}{}",
            first.as_str(),
            CONVERSATION_ID_SEPARATOR,
            second.as_str()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    /// Time-based id, `group_<unix-millis>`.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self(format!("{}{}", GROUP_ID_PREFIX, time.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination of a message: either a conversation or a group id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_group(&self) -> bool {
        self.0.starts_with(GROUP_ID_PREFIX)
    }
}

impl From<ConversationId> for ChatId {
    fn from(id: ConversationId) -> Self {
        Self(id.0)
    }
}

impl From<&ConversationId> for ChatId {
    fn from(id: &ConversationId) -> Self {
        Self(id.0.clone())
    }
}

impl From<GroupId> for ChatId {
    fn from(id: GroupId) -> Self {
        Self(id.0)
    }
}

impl From<&GroupId> for ChatId {
    fn from(id: &GroupId) -> Self {
        Self(id.0.clone())
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sender-generated message id, carried unchanged through every hop and
/// used as the dedup key on the receiving side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `<chat-id>-<unix-millis>-<uuid>`
    pub fn generate(chat: &ChatId, time: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-{}-{}",
            chat.as_str(),
            time.timestamp_millis(),
            Uuid::new_v4().simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
