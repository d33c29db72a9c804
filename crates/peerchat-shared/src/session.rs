//! The logged-in user, passed explicitly to everything that acts on the
//! user's behalf.
//!
//! A [`SessionContext`] is created by login and dropped by logout. The
//! negotiator uses it for the identity announcement, the sync engine for the
//! sender of outgoing messages and to recognise its own conversations.

use chrono::{DateTime, Utc};

use crate::models::User;
use crate::protocol::ChannelPayload;
use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    user: User,
    started_at: DateTime<Utc>,
}

impl SessionContext {
    pub fn new(user: User) -> Self {
        Self {
            user,
            started_at: Utc::now(),
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.phone
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The payload announcing this user to a freshly connected peer.
    pub fn announcement(&self) -> ChannelPayload {
        ChannelPayload::UserInfo(self.user.clone())
    }
}
