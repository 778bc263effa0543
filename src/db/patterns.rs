//! Pattern rows and pattern-change history.
//!
//! A pattern row is keyed by the SHA-256 digest of its canonical stage
//! encoding, so identical stage sequences share one row. Rows are created on
//! first use and never deleted by the engine: timers, presets, history rows
//! and session records all refer to them by digest.
//!
//! Every time a timer is set up with a pattern, a row is added to
//! `timer_pattern_history` recording who made the change and when.

use crate::db::db::Db;
use crate::libs::engine::{MemberId, TimerId};
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

const SELECT_PATTERN: &str = "SELECT patternid, short_repr, stage_str FROM patterns WHERE patternid = ?1";
const INSERT_PATTERN: &str = "INSERT OR IGNORE INTO patterns (patternid, short_repr, stage_str) VALUES (?1, ?2, ?3)";
const INSERT_HISTORY: &str =
    "INSERT INTO timer_pattern_history (timerid, patternid, modified_by, modified_at) VALUES (?1, ?2, ?3, ?4)";
const SELECT_HISTORY: &str = "SELECT timerid, patternid, modified_by, modified_at FROM timer_pattern_history
    WHERE timerid = ?1 ORDER BY modified_at DESC, id DESC";
const SELECT_CURRENT_PATTERNS: &str = "SELECT p.patternid, p.short_repr, p.stage_str FROM patterns p
    WHERE p.patternid IN (
        SELECT h.patternid FROM timer_pattern_history h
        WHERE h.id = (SELECT MAX(id) FROM timer_pattern_history WHERE timerid = h.timerid)
    )";

/// A stored pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRow {
    pub id: String,
    /// Whether the pattern prefers the compact `d1/d2/...` display.
    pub short_repr: bool,
    /// Canonical JSON encoding of the stage sequence.
    pub stage_str: String,
}

/// One recorded pattern change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternChange {
    pub timer: TimerId,
    pub pattern_id: String,
    pub modified_by: Option<MemberId>,
    pub modified_at: i64,
}

pub struct Patterns {
    conn: Arc<Mutex<Connection>>,
}

impl Patterns {
    pub fn new(db: &Db) -> Self {
        Self { conn: Arc::clone(&db.conn) }
    }

    pub fn fetch(&self, id: &str) -> Result<Option<PatternRow>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(SELECT_PATTERN, params![id], |row| {
                Ok(PatternRow {
                    id: row.get(0)?,
                    short_repr: row.get(1)?,
                    stage_str: row.get(2)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    /// Returns the row for `id`, creating it first if it does not exist.
    ///
    /// An existing row keeps the `short_repr` it was created with.
    pub fn fetch_or_create(&self, id: &str, short_repr: bool, stage_str: &str) -> Result<PatternRow> {
        {
            let conn = self.conn.lock();
            conn.execute(INSERT_PATTERN, params![id, short_repr, stage_str])?;
        }
        self.fetch(id)?
            .ok_or_else(|| anyhow::anyhow!("pattern {} missing after insert", id))
    }

    /// Patterns that are currently set up on some timer, per the history.
    pub fn fetch_current(&self) -> Result<Vec<PatternRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_CURRENT_PATTERNS)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PatternRow {
                    id: row.get(0)?,
                    short_repr: row.get(1)?,
                    stage_str: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn record_change(&self, timer: TimerId, pattern_id: &str, modified_by: Option<MemberId>, at: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            INSERT_HISTORY,
            params![timer as i64, pattern_id, modified_by.map(|m| m as i64), at],
        )?;
        Ok(())
    }

    /// Pattern changes of `timer`, newest first.
    pub fn history(&self, timer: TimerId) -> Result<Vec<PatternChange>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_HISTORY)?;
        let changes = stmt
            .query_map(params![timer as i64], |row| {
                Ok(PatternChange {
                    timer: row.get::<_, i64>(0)? as TimerId,
                    pattern_id: row.get(1)?,
                    modified_by: row.get::<_, Option<i64>>(2)?.map(|m| m as MemberId),
                    modified_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(changes)
    }
}
