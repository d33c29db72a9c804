//! The sync engine: merges what arrives on a peer channel into the local
//! store and pushes locally authored messages out.
//!
//! Merging is idempotent. Every chat envelope carries the id its sender
//! generated, and a message whose id is already stored is discarded, so
//! redelivery never creates a second row or moves a conversation summary.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SubsecRound, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use peerchat_net::{ChannelEvent, PeerChannel, PeerLink, PeerTransport};
use peerchat_shared::constants::MAX_MESSAGE_SIZE;
use peerchat_shared::models::{Conversation, Message, User};
use peerchat_shared::protocol::{ChannelPayload, ChatEnvelope};
use peerchat_shared::session::SessionContext;
use peerchat_shared::types::{ChatId, ConversationId, GroupId, MessageId};

use crate::chat::chat_includes;
use crate::error::{ClientError, Result};
use crate::events::{Delivery, Outbound, SyncEvent};
use crate::state::{lock_db, SharedDb};

pub struct SyncEngine<T> {
    session: SessionContext,
    db: SharedDb,
    channel: Arc<Mutex<Option<PeerChannel<T>>>>,
}

impl<T> Clone for SyncEngine<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            db: self.db.clone(),
            channel: self.channel.clone(),
        }
    }
}

impl<T: PeerTransport> SyncEngine<T> {
    pub fn new(session: SessionContext, db: SharedDb) -> Self {
        Self {
            session,
            db,
            channel: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Use `channel` for outgoing messages, replacing any previous one.
    pub fn attach(&self, channel: PeerChannel<T>) {
        *self.slot() = Some(channel);
        debug!("Sync engine attached to channel");
    }

    pub fn detach(&self) {
        if self.slot().take().is_some() {
            debug!("Sync engine detached from channel");
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> MutexGuard<'_, Option<PeerChannel<T>>> {
        self.channel.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a new message locally, then send it if a channel is attached.
    ///
    /// A message whose frame the peer would refuse as too large is
    /// rejected before anything is written. After the local write, a send
    /// error is logged, detaches the dead channel, and is reported as
    /// [`Delivery::NotConnected`].
    pub async fn send_message(&self, chat_id: &ChatId, content: &str) -> Result<Outbound> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        let me = self.session.user_id();

        let (message, payload) = {
            let mut db = lock_db(&self.db)?;
            if !chat_includes(&db, chat_id, me)? {
                return Err(ClientError::UnknownChat(chat_id.0.clone()));
            }

            let now = Utc::now().trunc_subsecs(3);
            let message = Message {
                id: MessageId::generate(chat_id, now),
                chat_id: chat_id.clone(),
                sender: me.clone(),
                content: content.to_string(),
                timestamp: now,
            };

            let payload = ChannelPayload::Chat(ChatEnvelope::from(&message));
            let size = payload.encode()?.len();
            if size > MAX_MESSAGE_SIZE {
                return Err(ClientError::MessageTooLarge {
                    size,
                    max: MAX_MESSAGE_SIZE,
                });
            }

            db.record_message(&message)?;
            (message, payload)
        };
        info!(msg_id = %message.id, chat = %message.chat_id, "Message stored locally");

        let channel = self.slot().clone();
        let delivery = match channel {
            None => Delivery::NotConnected,
            Some(channel) => {
                match channel.send_payload(&payload).await {
                    Ok(()) => Delivery::Sent,
                    Err(e) => {
                        warn!(msg_id = %message.id, error = %e, "Send failed, keeping local copy");
                        self.detach();
                        Delivery::NotConnected
                    }
                }
            }
        };

        Ok(Outbound { message, delivery })
    }

    /// Merge one text frame received from the peer.
    pub fn handle_payload(&self, text: &str) -> Result<SyncEvent> {
        match ChannelPayload::decode(text)? {
            ChannelPayload::UserInfo(user) => self.merge_user(user),
            ChannelPayload::Chat(envelope) => self.merge_chat(envelope),
        }
    }

    fn merge_user(&self, peer: User) -> Result<SyncEvent> {
        let me = self.session.user_id();
        if &peer.phone == me {
            return Ok(SyncEvent::Ignored(
                "identity announcement for the local user".into(),
            ));
        }
        if !peer.phone.is_valid_phone() {
            debug!(phone = ?peer.phone.as_str(), "Dropping announcement with invalid phone");
            return Ok(SyncEvent::Ignored(format!(
                "announced phone {:?} is not a valid number",
                peer.phone.as_str()
            )));
        }

        let db = lock_db(&self.db)?;
        db.save_user(&peer)?;
        let conversation = db.ensure_conversation(&Conversation::between(
            me,
            &peer.phone,
            Utc::now().trunc_subsecs(3),
        ))?;

        info!(peer = %peer.phone.short(), conversation = %conversation.id, "Peer identified");
        Ok(SyncEvent::ConversationReady { peer, conversation })
    }

    fn merge_chat(&self, envelope: ChatEnvelope) -> Result<SyncEvent> {
        let me = self.session.user_id();
        let now = Utc::now().trunc_subsecs(3);
        let mut db = lock_db(&self.db)?;

        if envelope.chat_id.is_group() {
            let group = db.get_group(&GroupId(envelope.chat_id.0.clone()))?;
            let known = group.is_some_and(|g| g.includes(me) && g.includes(&envelope.sender));
            if !known {
                debug!(chat = %envelope.chat_id, "Dropping message for unknown group");
                return Ok(SyncEvent::Ignored(format!(
                    "unknown group {}",
                    envelope.chat_id
                )));
            }
        } else {
            let expected = ConversationId::between(&envelope.sender, me);
            if envelope.chat_id.as_str() != expected.as_str() || &envelope.sender == me {
                debug!(chat = %envelope.chat_id, sender = %envelope.sender, "Dropping message for foreign conversation");
                return Ok(SyncEvent::Ignored(format!(
                    "conversation {} is not between {} and this user",
                    envelope.chat_id, envelope.sender
                )));
            }
            db.ensure_conversation(&Conversation::between(&envelope.sender, me, now))?;
        }

        let message = envelope.into_message(now);
        if db.record_message(&message)? {
            info!(msg_id = %message.id, chat = %message.chat_id, "Message stored");
            Ok(SyncEvent::MessageStored(message))
        } else {
            debug!(msg_id = %message.id, "Duplicate message discarded");
            Ok(SyncEvent::Duplicate(message.id))
        }
    }

    /// Attach to `link` and merge everything it delivers until the channel
    /// closes, forwarding each outcome to `notify`. Detaches on exit and
    /// sends a final [`SyncEvent::Disconnected`].
    pub async fn run(&self, mut link: PeerLink<T>, notify: mpsc::Sender<SyncEvent>) {
        self.attach(link.channel().clone());

        while let Some(event) = link.next_event().await {
            match event {
                ChannelEvent::Opened => {}
                ChannelEvent::Data(text) => match self.handle_payload(&text) {
                    Ok(outcome) => {
                        if notify.send(outcome).await.is_err() {
                            debug!("Sync listener gone");
                        }
                    }
                    Err(ClientError::Protocol(e)) => {
                        warn!(error = %e, "Dropping undecodable payload");
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to merge payload");
                    }
                },
                ChannelEvent::Closed => {
                    info!("Peer channel closed");
                    break;
                }
                ChannelEvent::Failed(reason) => {
                    warn!(%reason, "Peer channel failed");
                    break;
                }
            }
        }

        self.detach();
        let _ = notify.send(SyncEvent::Disconnected).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerchat_net::loopback::LoopbackTransport;
    use peerchat_shared::models::Group;
    use peerchat_shared::types::UserId;
    use peerchat_store::Database;

    type Engine = SyncEngine<LoopbackTransport>;

    const ME: &str = "+256700000002";
    const PEER: &str = "+256700000001";

    fn user(phone: &str, name: &str) -> User {
        User {
            phone: UserId::new(phone),
            username: name.into(),
            avatar: name[..1].to_uppercase(),
            created_at: "2024-05-01T09:00:00Z".parse().unwrap(),
        }
    }

    fn engine() -> (Engine, SharedDb) {
        let db = Database::open_in_memory().unwrap();
        db.add_user(&user(ME, "bosco")).unwrap();
        let db = Arc::new(Mutex::new(db));
        let session = SessionContext::new(user(ME, "bosco"));
        (SyncEngine::new(session, db.clone()), db)
    }

    fn chat(id: &str, chat_id: &str, sender: &str, content: &str) -> String {
        ChannelPayload::Chat(ChatEnvelope {
            id: MessageId::new(id),
            chat_id: ChatId::new(chat_id),
            sender: UserId::new(sender),
            content: content.into(),
            timestamp: Some("2024-05-01T10:00:00Z".parse().unwrap()),
        })
        .encode()
        .unwrap()
    }

    fn conv_id() -> ChatId {
        ConversationId::between(&UserId::new(ME), &UserId::new(PEER)).into()
    }

    #[test]
    fn test_identity_creates_user_and_conversation() {
        let (engine, db) = engine();
        let text = ChannelPayload::UserInfo(user(PEER, "amina")).encode().unwrap();

        match engine.handle_payload(&text).unwrap() {
            SyncEvent::ConversationReady { peer, conversation } => {
                assert_eq!(peer.username, "amina");
                assert_eq!(conversation.id.as_str(), "+256700000001_+256700000002");
            }
            other => panic!("expected ConversationReady, got {other:?}"),
        }

        // Announcing again replaces the profile without error.
        let renamed = ChannelPayload::UserInfo(user(PEER, "amina2")).encode().unwrap();
        engine.handle_payload(&renamed).unwrap();

        let db = db.lock().unwrap();
        assert_eq!(
            db.get_user(&UserId::new(PEER)).unwrap().unwrap().username,
            "amina2"
        );
        assert_eq!(db.list_conversations().unwrap().len(), 1);
    }

    #[test]
    fn test_own_identity_ignored() {
        let (engine, db) = engine();
        let text = ChannelPayload::UserInfo(user(ME, "impostor")).encode().unwrap();
        assert!(matches!(
            engine.handle_payload(&text).unwrap(),
            SyncEvent::Ignored(_)
        ));
        assert_eq!(
            db.lock().unwrap().get_user(&UserId::new(ME)).unwrap().unwrap().username,
            "bosco"
        );
    }

    #[test]
    fn test_identity_with_invalid_phone_ignored() {
        let (engine, db) = engine();
        let mut stranger = user(PEER, "amina");
        stranger.phone = UserId::new("€€");
        let text = ChannelPayload::UserInfo(stranger).encode().unwrap();

        assert!(matches!(
            engine.handle_payload(&text).unwrap(),
            SyncEvent::Ignored(_)
        ));

        let db = db.lock().unwrap();
        assert!(db.get_user(&UserId::new("€€")).unwrap().is_none());
        assert!(db.list_conversations().unwrap().is_empty());
    }

    #[test]
    fn test_redelivery_is_idempotent() {
        let (engine, db) = engine();
        let text = chat("c1-1000-0.5", conv_id().as_str(), PEER, "hi");

        assert!(matches!(
            engine.handle_payload(&text).unwrap(),
            SyncEvent::MessageStored(_)
        ));
        let snapshot = {
            let db = db.lock().unwrap();
            (
                db.get_messages(&conv_id()).unwrap(),
                db.list_conversations().unwrap(),
            )
        };

        for _ in 0..3 {
            assert_eq!(
                engine.handle_payload(&text).unwrap(),
                SyncEvent::Duplicate(MessageId::new("c1-1000-0.5"))
            );
        }

        let db = db.lock().unwrap();
        assert_eq!(db.get_messages(&conv_id()).unwrap(), snapshot.0);
        assert_eq!(db.list_conversations().unwrap(), snapshot.1);
        assert_eq!(snapshot.0.len(), 1);
        assert_eq!(snapshot.1[0].last_message, "hi");
    }

    #[test]
    fn test_foreign_conversation_ignored() {
        let (engine, db) = engine();
        let text = chat("m1", "+256700000001_+256700000003", PEER, "not for you");
        assert!(matches!(
            engine.handle_payload(&text).unwrap(),
            SyncEvent::Ignored(_)
        ));
        assert!(db.lock().unwrap().get_message(&MessageId::new("m1")).unwrap().is_none());
    }

    #[test]
    fn test_group_messages_need_known_group() {
        let (engine, db) = engine();
        let group = Group::create(
            "Trip",
            &UserId::new(PEER),
            [UserId::new(ME)],
            "2024-05-01T09:00:00Z".parse().unwrap(),
        );

        let text = chat("g1", group.id.as_str(), PEER, "packing list");
        assert!(matches!(
            engine.handle_payload(&text).unwrap(),
            SyncEvent::Ignored(_)
        ));

        db.lock().unwrap().create_group(&group).unwrap();
        assert!(matches!(
            engine.handle_payload(&text).unwrap(),
            SyncEvent::MessageStored(_)
        ));
        assert_eq!(
            db.lock().unwrap().get_messages(&(&group.id).into()).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_envelope_without_id_rejected() {
        let (engine, _db) = engine();
        let text = format!(
            r#"{{"chatId":"{}","sender":"{PEER}","content":"hi"}}"#,
            conv_id()
        );
        assert!(matches!(
            engine.handle_payload(&text),
            Err(ClientError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_send_while_detached_keeps_local_copy() {
        let (engine, db) = engine();
        db.lock()
            .unwrap()
            .save_conversation(&Conversation::between(
                &UserId::new(ME),
                &UserId::new(PEER),
                Utc::now(),
            ))
            .unwrap();

        let out = engine.send_message(&conv_id(), " hi ").await.unwrap();
        assert_eq!(out.delivery, Delivery::NotConnected);
        assert_eq!(out.message.content, "hi");
        assert!(out.message.id.as_str().starts_with(conv_id().as_str()));

        let db = db.lock().unwrap();
        assert_eq!(db.get_message(&out.message.id).unwrap(), Some(out.message));
        let conversation = db
            .get_conversation(&ConversationId::between(&UserId::new(ME), &UserId::new(PEER)))
            .unwrap()
            .unwrap();
        assert_eq!(conversation.last_message, "hi");
    }

    #[tokio::test]
    async fn test_oversized_message_rejected_before_storing() {
        let (engine, db) = engine();
        db.lock()
            .unwrap()
            .save_conversation(&Conversation::between(
                &UserId::new(ME),
                &UserId::new(PEER),
                Utc::now(),
            ))
            .unwrap();

        let content = "a".repeat(70_000);
        assert!(matches!(
            engine.send_message(&conv_id(), &content).await,
            Err(ClientError::MessageTooLarge { max: MAX_MESSAGE_SIZE, .. })
        ));

        let db = db.lock().unwrap();
        assert!(db.get_messages(&conv_id()).unwrap().is_empty());
        assert_eq!(db.list_conversations().unwrap()[0].last_message, "");
    }

    #[tokio::test]
    async fn test_send_validation() {
        let (engine, _db) = engine();
        assert!(matches!(
            engine.send_message(&conv_id(), "   ").await,
            Err(ClientError::EmptyMessage)
        ));
        assert!(matches!(
            engine.send_message(&conv_id(), "hi").await,
            Err(ClientError::UnknownChat(_))
        ));
    }
}
