//! Conversations and groups as seen by the logged-in user.

use chrono::{Duration, SubsecRound, Utc};
use tracing::info;

use peerchat_shared::models::{Conversation, Group, Message, User};
use peerchat_shared::types::{ChatId, ConversationId, GroupId, UserId};
use peerchat_store::Database;

use crate::error::{ClientError, Result};
use crate::state::{lock_db, AppState};

impl AppState {
    /// Every known user other than the logged-in one.
    pub fn contacts(&self) -> Result<Vec<User>> {
        let me = self.session()?.user_id().clone();
        let users = lock_db(&self.db)?.list_users()?;
        Ok(users.into_iter().filter(|u| u.phone != me).collect())
    }

    /// The two-party conversation with `peer`, created if missing.
    pub fn open_conversation(&self, peer: &UserId) -> Result<Conversation> {
        let me = self.session()?.user_id().clone();
        let db = lock_db(&self.db)?;
        if db.get_user(peer)?.is_none() {
            return Err(ClientError::UserNotFound(peer.0.clone()));
        }
        let conversation =
            db.ensure_conversation(&Conversation::between(&me, peer, Utc::now().trunc_subsecs(3)))?;
        Ok(conversation)
    }

    /// Conversations the user takes part in, newest summary first.
    pub fn conversations(&self) -> Result<Vec<Conversation>> {
        let me = self.session()?.user_id().clone();
        let all = lock_db(&self.db)?.list_conversations()?;
        Ok(all.into_iter().filter(|c| c.includes(&me)).collect())
    }

    /// Create a group administered by the logged-in user. The user is
    /// always a participant, listed or not.
    pub fn create_group(&self, name: &str, members: &[UserId]) -> Result<Group> {
        let me = self.session()?.user_id().clone();

        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::EmptyGroupName);
        }
        if members.iter().all(|m| *m == me) {
            return Err(ClientError::NoGroupMembers);
        }

        let mut group = Group::create(
            name,
            &me,
            members.iter().cloned(),
            Utc::now().trunc_subsecs(3),
        );

        // Ids are millisecond-based; step past any group made in the same one.
        let mut db = lock_db(&self.db)?;
        let mut stamp = group.created_at;
        while db.get_group(&group.id)?.is_some() {
            stamp += Duration::milliseconds(1);
            group.id = GroupId::at(stamp);
        }
        db.create_group(&group)?;

        info!(group = %group.id, members = group.participants.len(), "Group created");
        Ok(group)
    }

    pub fn groups(&self) -> Result<Vec<Group>> {
        let me = self.session()?.user_id().clone();
        let all = lock_db(&self.db)?.list_groups()?;
        Ok(all.into_iter().filter(|g| g.includes(&me)).collect())
    }

    /// Messages of a conversation or group the user belongs to, oldest first.
    pub fn messages(&self, chat: &ChatId) -> Result<Vec<Message>> {
        let me = self.session()?.user_id().clone();
        let db = lock_db(&self.db)?;
        if !chat_includes(&db, chat, &me)? {
            return Err(ClientError::UnknownChat(chat.0.clone()));
        }
        Ok(db.get_messages(chat)?)
    }
}

/// Whether `chat` is a stored conversation or group that `user` is part of.
pub(crate) fn chat_includes(db: &Database, chat: &ChatId, user: &UserId) -> Result<bool> {
    if chat.is_group() {
        let group = db.get_group(&GroupId(chat.0.clone()))?;
        Ok(group.is_some_and(|g| g.includes(user)))
    } else {
        let id = ConversationId(chat.0.clone());
        let conversation = db.get_conversation(&id)?;
        Ok(conversation.is_some_and(|c| c.includes(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged_in(phone: &str) -> AppState {
        let mut app = AppState::new(Database::open_in_memory().unwrap());
        app.register(phone, "me", "M").unwrap();
        app.login(phone).unwrap();
        app
    }

    fn add_peer(app: &AppState, phone: &str, name: &str) -> UserId {
        let user = User {
            phone: UserId::new(phone),
            username: name.into(),
            avatar: "P".into(),
            created_at: Utc::now(),
        };
        lock_db(&app.db).unwrap().save_user(&user).unwrap();
        user.phone
    }

    #[test]
    fn test_requires_login() {
        let app = AppState::new(Database::open_in_memory().unwrap());
        assert!(matches!(app.conversations(), Err(ClientError::NotAuthenticated)));
        assert!(matches!(
            app.create_group("Trip", &[UserId::new("+256700000002")]),
            Err(ClientError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_open_conversation_is_stable() {
        let app = logged_in("+256700000002");
        let peer = add_peer(&app, "+256700000001", "amina");

        let first = app.open_conversation(&peer).unwrap();
        let again = app.open_conversation(&peer).unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(first.id, ConversationId("+256700000001_+256700000002".into()));
        assert_eq!(app.conversations().unwrap().len(), 1);
        assert_eq!(app.contacts().unwrap().len(), 1);
    }

    #[test]
    fn test_open_conversation_unknown_peer() {
        let app = logged_in("+256700000001");
        assert!(matches!(
            app.open_conversation(&UserId::new("+256700000009")),
            Err(ClientError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_listing_filters_by_participant() {
        let app = logged_in("+256700000001");
        let b = add_peer(&app, "+256700000002", "bosco");
        let c = add_peer(&app, "+256700000003", "chris");
        app.open_conversation(&b).unwrap();

        let foreign = Conversation::between(&b, &c, Utc::now());
        lock_db(&app.db).unwrap().save_conversation(&foreign).unwrap();
        let foreign_group = Group::create("Other", &b, [c.clone()], Utc::now());
        lock_db(&app.db).unwrap().create_group(&foreign_group).unwrap();

        let conversations = app.conversations().unwrap();
        assert_eq!(conversations.len(), 1);
        assert!(conversations[0].includes(&UserId::new("+256700000001")));
        assert!(app.groups().unwrap().is_empty());
        assert!(matches!(
            app.messages(&foreign.id.into()),
            Err(ClientError::UnknownChat(_))
        ));
    }

    #[test]
    fn test_create_group_includes_creator() {
        let app = logged_in("+256700000001");
        let me = UserId::new("+256700000001");
        let members = [UserId::new("+256700000002"), UserId::new("+256700000003")];

        let trip = app.create_group("Trip", &members).unwrap();
        assert_eq!(trip.participants.len(), members.len() + 1);
        assert!(trip.includes(&me));
        assert_eq!(trip.admin, me);
        assert!(trip.id.as_str().starts_with("group_"));

        assert_eq!(app.groups().unwrap(), vec![trip]);
    }

    #[test]
    fn test_groups_created_back_to_back_get_distinct_ids() {
        let app = logged_in("+256700000001");
        let members = [UserId::new("+256700000002")];

        let ids: std::collections::HashSet<_> = (0..10)
            .map(|i| app.create_group(&format!("Trip {i}"), &members).unwrap().id)
            .collect();
        assert_eq!(ids.len(), 10);
        assert_eq!(app.groups().unwrap().len(), 10);
    }

    #[test]
    fn test_create_group_validation() {
        let app = logged_in("+256700000001");
        assert!(matches!(
            app.create_group("  ", &[UserId::new("+256700000002")]),
            Err(ClientError::EmptyGroupName)
        ));
        assert!(matches!(
            app.create_group("Solo", &[]),
            Err(ClientError::NoGroupMembers)
        ));
        assert!(matches!(
            app.create_group("Solo", &[UserId::new("+256700000001")]),
            Err(ClientError::NoGroupMembers)
        ));
    }
}
