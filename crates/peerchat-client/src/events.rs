use peerchat_shared::models::{Conversation, Message, User};
use peerchat_shared::types::MessageId;

/// What the sync engine did with one inbound payload, or with the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A peer announced itself; its conversation exists and can be opened.
    ConversationReady {
        peer: User,
        conversation: Conversation,
    },
    /// A new message was stored.
    MessageStored(Message),
    /// A message with this id was already stored; nothing changed.
    Duplicate(MessageId),
    /// The payload was valid but not for us.
    Ignored(String),
    /// The channel closed or failed and the engine detached from it.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to an open channel. No acknowledgement exists beyond this.
    Sent,
    /// Stored locally only; the peer sees it once it is resent.
    NotConnected,
}

/// A locally authored message and what happened to it on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub message: Message,
    pub delivery: Delivery,
}
