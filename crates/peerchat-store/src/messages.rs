use rusqlite::{params, OptionalExtension};

use peerchat_shared::models::Message;
use peerchat_shared::types::{ChatId, MessageId, UserId};

use crate::database::{decode_ts, encode_ts, Database};
use crate::error::Result;

impl Database {
    /// Insert a message. Fails if the id is already present.
    pub fn add_message(&self, message: &Message) -> Result<()> {
        self.conn().execute(
            "INSERT INTO messages (id, chat_id, sender, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.as_str(),
                message.chat_id.as_str(),
                message.sender.as_str(),
                message.content,
                encode_ts(&message.timestamp),
            ],
        )?;
        Ok(())
    }

    /// Insert the message if its id is new and, in the same transaction,
    /// set the owning conversation's last-message summary.
    ///
    /// Returns `false` when a message with this id already exists; nothing
    /// is written in that case, so repeated delivery leaves the store
    /// unchanged.
    pub fn record_message(&mut self, message: &Message) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO messages (id, chat_id, sender, content, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.as_str(),
                message.chat_id.as_str(),
                message.sender.as_str(),
                message.content,
                encode_ts(&message.timestamp),
            ],
        )?;

        if inserted == 0 {
            return Ok(false);
        }

        // Groups carry no summary; for them this touches no row.
        tx.execute(
            "UPDATE conversations SET last_message = ?1, last_message_time = ?2 WHERE id = ?3",
            params![
                message.content,
                encode_ts(&message.timestamp),
                message.chat_id.as_str(),
            ],
        )?;

        tx.commit()?;
        Ok(true)
    }

    /// All messages of a conversation or group, in timestamp order. Equal
    /// timestamps keep the order in which they were received.
    pub fn get_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, chat_id, sender, content, timestamp
             FROM messages
             WHERE chat_id = ?1
             ORDER BY timestamp ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![chat_id.as_str()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, chat_id, sender, content, timestamp FROM messages WHERE id = ?1",
                params![id.as_str()],
                row_to_message,
            )
            .optional()?)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let chat_id: String = row.get(1)?;
    let sender: String = row.get(2)?;
    let ts_str: String = row.get(4)?;

    Ok(Message {
        id: MessageId(id),
        chat_id: ChatId(chat_id),
        sender: UserId(sender),
        content: row.get(3)?,
        timestamp: decode_ts(4, &ts_str)?,
    })
}
