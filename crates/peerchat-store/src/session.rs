//! The login remembered across restarts (one row at most).

use rusqlite::{params, OptionalExtension};

use peerchat_shared::types::UserId;

use crate::database::Database;
use crate::error::Result;

impl Database {
    pub fn current_user(&self) -> Result<Option<UserId>> {
        Ok(self
            .conn()
            .query_row("SELECT phone FROM local_session WHERE id = 1", [], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .map(UserId))
    }

    pub fn set_current_user(&self, phone: &UserId) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO local_session (id, phone) VALUES (1, ?1)",
            params![phone.as_str()],
        )?;
        Ok(())
    }

    pub fn clear_current_user(&self) -> Result<()> {
        self.conn().execute("DELETE FROM local_session", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.current_user().unwrap(), None);

        db.set_current_user(&UserId::new("+256700000001")).unwrap();
        db.set_current_user(&UserId::new("+256700000002")).unwrap();
        assert_eq!(db.current_user().unwrap(), Some(UserId::new("+256700000002")));

        db.clear_current_user().unwrap();
        assert_eq!(db.current_user().unwrap(), None);
    }
}
