//! CRUD operations for [`Group`] records.
//!
//! A group row lives in `chat_groups`; its fixed participant set lives in
//! `group_members` and is written in the same transaction.

use std::collections::BTreeSet;

use rusqlite::{params, OptionalExtension};

use peerchat_shared::models::Group;
use peerchat_shared::types::{GroupId, UserId};

use crate::database::{decode_ts, encode_ts, Database};
use crate::error::Result;

impl Database {
    /// Insert a new group and its members. Fails if the id already exists.
    pub fn create_group(&mut self, group: &Group) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute(
            "INSERT INTO chat_groups (id, name, admin, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                group.id.as_str(),
                group.name,
                group.admin.as_str(),
                encode_ts(&group.created_at),
            ],
        )?;

        {
            let mut stmt =
                tx.prepare("INSERT INTO group_members (group_id, phone) VALUES (?1, ?2)")?;
            for member in &group.participants {
                stmt.execute(params![group.id.as_str(), member.as_str()])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_group(&self, id: &GroupId) -> Result<Option<Group>> {
        let header = self
            .conn()
            .query_row(
                "SELECT id, name, admin, created_at FROM chat_groups WHERE id = ?1",
                params![id.as_str()],
                row_to_group,
            )
            .optional()?;

        match header {
            Some(mut group) => {
                group.participants = self.group_members(&group.id)?;
                Ok(Some(group))
            }
            None => Ok(None),
        }
    }

    /// List all groups, ordered by name.
    pub fn list_groups(&self) -> Result<Vec<Group>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, name, admin, created_at FROM chat_groups ORDER BY name ASC")?;
        let rows = stmt.query_map([], row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            let mut group = row?;
            group.participants = self.group_members(&group.id)?;
            groups.push(group);
        }
        Ok(groups)
    }

    fn group_members(&self, id: &GroupId) -> Result<BTreeSet<UserId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT phone FROM group_members WHERE group_id = ?1")?;
        let rows = stmt.query_map(params![id.as_str()], |row| row.get::<_, String>(0))?;

        let mut members = BTreeSet::new();
        for row in rows {
            members.insert(UserId(row?));
        }
        Ok(members)
    }
}

/// Maps the header columns; participants are filled in by the caller.
fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    let id: String = row.get(0)?;
    let admin: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    Ok(Group {
        id: GroupId(id),
        name: row.get(1)?,
        participants: BTreeSet::new(),
        admin: UserId(admin),
        created_at: decode_ts(3, &created_str)?,
    })
}
