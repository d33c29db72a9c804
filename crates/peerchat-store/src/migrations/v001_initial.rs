//! v001 -- Initial schema creation.
//!
//! Creates the record tables: `users`, `conversations`, `messages`,
//! `chat_groups` and `group_members`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (own account and peer-learned copies)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    phone      TEXT PRIMARY KEY NOT NULL,   -- "+256" + 9 digits
    username   TEXT NOT NULL,
    avatar     TEXT NOT NULL,               -- single character
    created_at TEXT NOT NULL                -- RFC-3339, millisecond precision
);

-- Not UNIQUE: a peer may legitimately announce a name already used by
-- another row. Registration checks uniqueness itself.
CREATE INDEX IF NOT EXISTS idx_users_username ON users(username);

-- ----------------------------------------------------------------
-- Conversations (two-party)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id                TEXT PRIMARY KEY NOT NULL,  -- "<phone-a>_<phone-b>", sorted
    participant_a     TEXT NOT NULL,
    participant_b     TEXT NOT NULL,
    last_message      TEXT NOT NULL DEFAULT '',
    last_message_time TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_last_time
    ON conversations(last_message_time DESC);

-- ----------------------------------------------------------------
-- Groups
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_groups (
    id         TEXT PRIMARY KEY NOT NULL,   -- "group_<unix-millis>"
    name       TEXT NOT NULL,
    admin      TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chat_groups_name ON chat_groups(name);

CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL,
    phone    TEXT NOT NULL,

    PRIMARY KEY (group_id, phone),
    FOREIGN KEY (group_id) REFERENCES chat_groups(id) ON DELETE CASCADE
);

-- ----------------------------------------------------------------
-- Messages (receive-order log; rowid is the insertion sequence)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id        TEXT PRIMARY KEY NOT NULL,    -- sender-generated, dedup key
    chat_id   TEXT NOT NULL,                -- conversation or group id
    sender    TEXT NOT NULL,
    content   TEXT NOT NULL,
    timestamp TEXT NOT NULL                 -- sender clock
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
    ON messages(chat_id, timestamp);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
