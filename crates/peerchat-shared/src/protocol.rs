//! Application payloads exchanged over the open data channel.
//!
//! Two shapes share the channel, told apart by the `type` field:
//!
//! ```text
//! {"type":"user-info","user":{"phone":..,"username":..,"avatar":..,"createdAt":..}}
//! {"type":"chat","id":..,"chatId":..,"sender":..,"content":..,"timestamp":..}
//! ```
//!
//! A payload without `type` is a chat envelope. Chat envelopes must carry
//! `id` in both directions; it is the receiver's dedup key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{MAX_MESSAGE_SIZE, PAYLOAD_TYPE_CHAT, PAYLOAD_TYPE_USER_INFO};
use crate::error::ProtocolError;
use crate::models::{Message, User};
use crate::types::{ChatId, MessageId, UserId};

/// Every payload that may travel over the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelPayload {
    /// Self-announcement sent first on every freshly opened channel.
    UserInfo(User),
    /// A chat message.
    Chat(ChatEnvelope),
}

/// A chat message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatEnvelope {
    pub id: MessageId,
    #[serde(alias = "conversationId")]
    pub chat_id: ChatId,
    pub sender: UserId,
    pub content: String,
    /// Sender's clock. Older peers omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatEnvelope {
    /// Turn the envelope into a stored message, falling back to
    /// `received_at` when the sender sent no timestamp.
    pub fn into_message(self, received_at: DateTime<Utc>) -> Message {
        Message {
            id: self.id,
            chat_id: self.chat_id,
            sender: self.sender,
            content: self.content,
            timestamp: self.timestamp.unwrap_or(received_at),
        }
    }
}

impl From<&Message> for ChatEnvelope {
    fn from(m: &Message) -> Self {
        Self {
            id: m.id.clone(),
            chat_id: m.chat_id.clone(),
            sender: m.sender.clone(),
            content: m.content.clone(),
            timestamp: Some(m.timestamp),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum Outgoing<'a> {
    #[serde(rename = "user-info")]
    UserInfo { user: &'a User },
    #[serde(rename = "chat")]
    Chat(&'a ChatEnvelope),
}

impl ChannelPayload {
    /// Serialize to the JSON text sent over the data channel.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let outgoing = match self {
            ChannelPayload::UserInfo(user) => Outgoing::UserInfo { user },
            ChannelPayload::Chat(chat) => Outgoing::Chat(chat),
        };
        Ok(serde_json::to_string(&outgoing)?)
    }

    /// Parse JSON text received from the data channel.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        if text.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::TooLarge {
                size: text.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let mut value: Value = serde_json::from_str(text)?;

        let kind = match value.get("type") {
            None | Some(Value::Null) => PAYLOAD_TYPE_CHAT.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(ProtocolError::UnknownType(other.to_string())),
        };

        match kind.as_str() {
            PAYLOAD_TYPE_USER_INFO => {
                let user = value
                    .get_mut("user")
                    .map(Value::take)
                    .ok_or(ProtocolError::MissingField("user"))?;
                Ok(ChannelPayload::UserInfo(serde_json::from_value(user)?))
            }
            PAYLOAD_TYPE_CHAT => {
                if value.get("id").map_or(true, Value::is_null) {
                    return Err(ProtocolError::MissingField("id"));
                }
                Ok(ChannelPayload::Chat(serde_json::from_value(value)?))
            }
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }
}
