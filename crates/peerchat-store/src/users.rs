//! CRUD operations for [`User`] records.

use rusqlite::{params, OptionalExtension};

use peerchat_shared::models::User;
use peerchat_shared::types::UserId;

use crate::database::{decode_ts, encode_ts, Database};
use crate::error::Result;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user. Fails if the phone is already present.
    pub fn add_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (phone, username, avatar, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user.phone.as_str(),
                user.username,
                user.avatar,
                encode_ts(&user.created_at),
            ],
        )?;
        Ok(())
    }

    /// Create or replace a user keyed by phone. Never fails because the row
    /// already exists.
    pub fn save_user(&self, user: &User) -> Result<()> {
        self.conn().execute(
            "INSERT INTO users (phone, username, avatar, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(phone) DO UPDATE SET
                 username   = excluded.username,
                 avatar     = excluded.avatar,
                 created_at = excluded.created_at",
            params![
                user.phone.as_str(),
                user.username,
                user.avatar,
                encode_ts(&user.created_at),
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, phone: &UserId) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT phone, username, avatar, created_at FROM users WHERE phone = ?1",
                params![phone.as_str()],
                row_to_user,
            )
            .optional()?)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT phone, username, avatar, created_at FROM users
                 WHERE username = ?1 ORDER BY created_at ASC LIMIT 1",
                params![username],
                row_to_user,
            )
            .optional()?)
    }

    /// List all users, ordered by username.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(
            "SELECT phone, username, avatar, created_at FROM users ORDER BY username ASC",
        )?;
        let rows = stmt.query_map([], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let phone: String = row.get(0)?;
    let created_str: String = row.get(3)?;

    Ok(User {
        phone: UserId(phone),
        username: row.get(1)?,
        avatar: row.get(2)?,
        created_at: decode_ts(3, &created_str)?,
    })
}
