//! Completed member sessions.
//!
//! A session record is written once, when a subscriber's session closes and
//! lasted longer than the configured minimum. The per-stage breakdown is
//! stored as JSON alongside the totals.

use crate::db::db::Db;
use crate::libs::engine::{GroupId, MemberId, TimerId};
use crate::libs::subscriber::StageTally;
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const INSERT_SESSION: &str = "INSERT INTO sessions
    (memberid, groupid, timerid, start_time, duration, focused_duration, patternid, stages)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";
const SELECT_SESSIONS: &str = "SELECT memberid, groupid, timerid, start_time, duration, focused_duration, patternid, stages
    FROM sessions
    WHERE (?1 IS NULL OR memberid = ?1) AND (?2 IS NULL OR groupid = ?2)
    ORDER BY start_time DESC, id DESC
    LIMIT ?3";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub member: MemberId,
    pub group: GroupId,
    pub timer: TimerId,
    pub start_time: i64,
    /// Seconds between joining (or the timer starting) and the session closing.
    pub duration: i64,
    /// Seconds spent in focus stages.
    pub focused_duration: i64,
    pub pattern_id: String,
    pub stages: Vec<StageTally>,
}

impl SessionRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let stages: String = row.get(7)?;
        Ok(Self {
            member: row.get::<_, i64>(0)? as MemberId,
            group: row.get::<_, i64>(1)? as GroupId,
            timer: row.get::<_, i64>(2)? as TimerId,
            start_time: row.get(3)?,
            duration: row.get(4)?,
            focused_duration: row.get(5)?,
            pattern_id: row.get(6)?,
            stages: serde_json::from_str(&stages).unwrap_or_default(),
        })
    }
}

pub struct Sessions {
    conn: Arc<Mutex<Connection>>,
}

impl Sessions {
    pub fn new(db: &Db) -> Self {
        Self { conn: Arc::clone(&db.conn) }
    }

    pub fn insert(&self, record: &SessionRecord) -> Result<()> {
        let stages = serde_json::to_string(&record.stages)?;
        let conn = self.conn.lock();
        conn.execute(
            INSERT_SESSION,
            params![
                record.member as i64,
                record.group as i64,
                record.timer as i64,
                record.start_time,
                record.duration,
                record.focused_duration,
                record.pattern_id,
                stages,
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions, optionally filtered by member and group.
    pub fn fetch(&self, member: Option<MemberId>, group: Option<GroupId>, limit: usize) -> Result<Vec<SessionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_SESSIONS)?;
        let records = stmt
            .query_map(
                params![member.map(|m| m as i64), group.map(|g| g as i64), limit as i64],
                SessionRecord::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
