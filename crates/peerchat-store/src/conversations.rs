//! CRUD operations for [`Conversation`] records.

use rusqlite::{params, OptionalExtension};

use peerchat_shared::models::Conversation;
use peerchat_shared::types::{ConversationId, UserId};

use crate::database::{decode_ts, encode_ts, Database};
use crate::error::Result;

impl Database {
    /// Create or replace a conversation, including its summary.
    pub fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        self.conn().execute(
            "INSERT INTO conversations
                 (id, participant_a, participant_b, last_message, last_message_time)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 participant_a     = excluded.participant_a,
                 participant_b     = excluded.participant_b,
                 last_message      = excluded.last_message,
                 last_message_time = excluded.last_message_time",
            params![
                conversation.id.as_str(),
                conversation.participants[0].as_str(),
                conversation.participants[1].as_str(),
                conversation.last_message,
                encode_ts(&conversation.last_message_time),
            ],
        )?;
        Ok(())
    }

    /// Insert the conversation unless one with the same id exists, then
    /// return the stored row. An existing summary is left untouched.
    pub fn ensure_conversation(&self, conversation: &Conversation) -> Result<Conversation> {
        self.conn().execute(
            "INSERT OR IGNORE INTO conversations
                 (id, participant_a, participant_b, last_message, last_message_time)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                conversation.id.as_str(),
                conversation.participants[0].as_str(),
                conversation.participants[1].as_str(),
                conversation.last_message,
                encode_ts(&conversation.last_message_time),
            ],
        )?;
        Ok(self
            .get_conversation(&conversation.id)?
            .unwrap_or_else(|| conversation.clone()))
    }

    pub fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, participant_a, participant_b, last_message, last_message_time
                 FROM conversations WHERE id = ?1",
                params![id.as_str()],
                row_to_conversation,
            )
            .optional()?)
    }

    /// List all conversations, most recent summary first.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, participant_a, participant_b, last_message, last_message_time
             FROM conversations
             ORDER BY last_message_time DESC",
        )?;
        let rows = stmt.query_map([], row_to_conversation)?;

        let mut conversations = Vec::new();
        for row in rows {
            conversations.push(row?);
        }
        Ok(conversations)
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let id: String = row.get(0)?;
    let a: String = row.get(1)?;
    let b: String = row.get(2)?;
    let ts_str: String = row.get(4)?;

    Ok(Conversation {
        id: ConversationId(id),
        participants: [UserId(a), UserId(b)],
        last_message: row.get(3)?,
        last_message_time: decode_ts(4, &ts_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn pair() -> (UserId, UserId) {
        (UserId::new("+256700000001"), UserId::new("+256700000002"))
    }

    #[test]
    fn test_save_is_upsert() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = pair();
        let mut conv = Conversation::between(&a, &b, Utc::now());
        db.save_conversation(&conv).unwrap();

        conv.last_message = "hello".into();
        db.save_conversation(&conv).unwrap();

        let all = db.list_conversations().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].last_message, "hello");
    }

    #[test]
    fn test_ensure_keeps_existing_summary() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = pair();
        let mut conv = Conversation::between(&a, &b, Utc::now());
        conv.last_message = "first".into();
        db.save_conversation(&conv).unwrap();

        let fresh = Conversation::between(&b, &a, Utc::now());
        let stored = db.ensure_conversation(&fresh).unwrap();
        assert_eq!(stored.last_message, "first");
    }

    #[test]
    fn test_list_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = pair();
        let c = UserId::new("+256700000003");
        let now = Utc::now();

        db.save_conversation(&Conversation::between(&a, &b, now - Duration::minutes(5)))
            .unwrap();
        db.save_conversation(&Conversation::between(&a, &c, now)).unwrap();

        let ids: Vec<_> = db
            .list_conversations()
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(
            ids,
            vec![ConversationId::between(&a, &c), ConversationId::between(&a, &b)]
        );
    }
}
