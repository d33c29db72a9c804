use rusqlite::Connection;

const UP_SQL: &str = r#"
-- The phone of the user logged in on this device, if any.
CREATE TABLE IF NOT EXISTS local_session (
    id    INTEGER PRIMARY KEY CHECK (id = 1),
    phone TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
