//! Per-member data: last known display name and notification level.

use crate::db::db::Db;
use crate::libs::engine::MemberId;
use crate::libs::subscriber::NotifyLevel;
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

const UPSERT_NAME: &str = "INSERT INTO members (memberid, name) VALUES (?1, ?2)
    ON CONFLICT(memberid) DO UPDATE SET name = excluded.name";
const UPSERT_NOTIFY_LEVEL: &str = "INSERT INTO members (memberid, notify_level) VALUES (?1, ?2)
    ON CONFLICT(memberid) DO UPDATE SET notify_level = excluded.notify_level";
const SELECT_MEMBER: &str = "SELECT name, notify_level FROM members WHERE memberid = ?1";

pub struct Members {
    conn: Arc<Mutex<Connection>>,
}

impl Members {
    pub fn new(db: &Db) -> Self {
        Self { conn: Arc::clone(&db.conn) }
    }

    pub fn set_name(&self, member: MemberId, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(UPSERT_NAME, params![member as i64, name])?;
        Ok(())
    }

    pub fn name(&self, member: MemberId) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let name = conn
            .query_row(SELECT_MEMBER, params![member as i64], |row| row.get::<_, Option<String>>(0))
            .optional()?;
        Ok(name.flatten())
    }

    /// The member's notification level, `Warning` when never set.
    pub fn notify_level(&self, member: MemberId) -> Result<NotifyLevel> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(SELECT_MEMBER, params![member as i64], |row| row.get::<_, Option<i64>>(1))
            .optional()?
            .flatten();
        Ok(raw.and_then(NotifyLevel::from_raw).unwrap_or_default())
    }

    pub fn set_notify_level(&self, member: MemberId, level: NotifyLevel) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(UPSERT_NOTIFY_LEVEL, params![member as i64, level as i64])?;
        Ok(())
    }
}
