//! Domain records shared by the store, the negotiator and the sync engine.
//!
//! Field names serialize in camelCase so the same JSON shape is understood
//! by browser peers.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ChatId, ConversationId, GroupId, MessageId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A known user. Created at registration, or on first identity announcement
/// received from a peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub phone: UserId,
    pub username: String,
    /// Single-character avatar tag.
    pub avatar: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Two-party conversation with its last-message summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    /// Exactly two ids, sorted.
    pub participants: [UserId; 2],
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
}

impl Conversation {
    /// Empty conversation between `a` and `b`. The id does not depend on
    /// argument order.
    pub fn between(a: &UserId, b: &UserId, now: DateTime<Utc>) -> Self {
        let mut participants = [a.clone(), b.clone()];
        participants.sort();
        Self {
            id: ConversationId::between(a, b),
            participants,
            last_message: String::new(),
            last_message_time: now,
        }
    }

    pub fn includes(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| p == user)
    }

    /// The participant that is not `me`.
    pub fn peer_of(&self, me: &UserId) -> Option<&UserId> {
        self.participants.iter().find(|p| *p != me)
    }
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A named group. The participant set is fixed at creation and always
/// contains the admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub participants: BTreeSet<UserId>,
    pub admin: UserId,
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Build a group owned by `admin`. The admin is added to `members`;
    /// duplicates collapse.
    pub fn create(
        name: impl Into<String>,
        admin: &UserId,
        members: impl IntoIterator<Item = UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut participants: BTreeSet<UserId> = members.into_iter().collect();
        participants.insert(admin.clone());
        Self {
            id: GroupId::at(now),
            name: name.into(),
            participants,
            admin: admin.clone(),
            created_at: now,
        }
    }

    pub fn includes(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat message. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    /// Conversation or group id.
    pub chat_id: ChatId,
    pub sender: UserId,
    pub content: String,
    /// Sender's local clock; not verified.
    pub timestamp: DateTime<Utc>,
}
