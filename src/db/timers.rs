//! Durable group timer definitions.
//!
//! A definition is everything about a timer that survives restarts without a
//! snapshot: its identity (which doubles as the membership tag id), group,
//! notification channel, display name, default pattern and settings. Runtime
//! state (stage, subscribers, sessions) lives in the engine and the snapshot.

use crate::db::db::Db;
use crate::libs::engine::{ChannelId, GroupId, LabelId, TimerId};
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Label format used when none is configured.
pub const DEFAULT_LABEL_FORMAT: &str = "{name} - {stage_name} ({remaining})";

const COLUMNS: &str = "timerid, groupid, channelid, name, patternid, label_target, voice_alert, auto_reset, compact,
    label_format, track_voice_join, track_voice_leave";

const UPSERT_TIMER: &str = "INSERT OR REPLACE INTO timers (timerid, groupid, channelid, name, patternid, label_target,
    voice_alert, auto_reset, compact, label_format, track_voice_join, track_voice_leave)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";
const UPDATE_CHANNEL: &str = "UPDATE timers SET channelid = ?2 WHERE timerid = ?1";
const DELETE_TIMER: &str = "DELETE FROM timers WHERE timerid = ?1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerDefinition {
    pub id: TimerId,
    pub group: GroupId,
    pub channel: ChannelId,
    pub name: String,
    /// Digest of the default pattern; `None` uses the engine default.
    pub default_pattern: Option<String>,
    /// Voice channel (or other label) renamed with the timer status.
    pub label_target: Option<LabelId>,
    pub voice_alert: bool,
    /// Reset to the default pattern when a stage ends with no subscribers.
    pub auto_reset: bool,
    /// Omit the "please respond" line from announcements.
    pub compact: bool,
    pub label_format: String,
    pub track_voice_join: bool,
    pub track_voice_leave: bool,
}

impl TimerDefinition {
    pub fn new(id: TimerId, group: GroupId, channel: ChannelId, name: &str) -> Self {
        Self {
            id,
            group,
            channel,
            name: name.to_string(),
            default_pattern: None,
            label_target: None,
            voice_alert: false,
            auto_reset: false,
            compact: false,
            label_format: DEFAULT_LABEL_FORMAT.to_string(),
            track_voice_join: true,
            track_voice_leave: true,
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get::<_, i64>(0)? as TimerId,
            group: row.get::<_, i64>(1)? as GroupId,
            channel: row.get::<_, i64>(2)? as ChannelId,
            name: row.get(3)?,
            default_pattern: row.get(4)?,
            label_target: row.get::<_, Option<i64>>(5)?.map(|l| l as LabelId),
            voice_alert: row.get(6)?,
            auto_reset: row.get(7)?,
            compact: row.get(8)?,
            label_format: row.get(9)?,
            track_voice_join: row.get(10)?,
            track_voice_leave: row.get(11)?,
        })
    }
}

pub struct Timers {
    conn: Arc<Mutex<Connection>>,
}

impl Timers {
    pub fn new(db: &Db) -> Self {
        Self { conn: Arc::clone(&db.conn) }
    }

    /// Stores `definition`, replacing any timer with the same id.
    pub fn upsert(&self, definition: &TimerDefinition) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            UPSERT_TIMER,
            params![
                definition.id as i64,
                definition.group as i64,
                definition.channel as i64,
                definition.name,
                definition.default_pattern,
                definition.label_target.map(|l| l as i64),
                definition.voice_alert,
                definition.auto_reset,
                definition.compact,
                definition.label_format,
                definition.track_voice_join,
                definition.track_voice_leave,
            ],
        )?;
        Ok(())
    }

    pub fn fetch(&self, id: TimerId) -> Result<Option<TimerDefinition>> {
        let conn = self.conn.lock();
        let definition = conn
            .query_row(
                &format!("SELECT {} FROM timers WHERE timerid = ?1", COLUMNS),
                params![id as i64],
                TimerDefinition::from_row,
            )
            .optional()?;
        Ok(definition)
    }

    pub fn fetch_all(&self) -> Result<Vec<TimerDefinition>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM timers ORDER BY groupid, channelid, timerid", COLUMNS))?;
        let definitions = stmt
            .query_map([], TimerDefinition::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(definitions)
    }

    pub fn fetch_group(&self, group: GroupId) -> Result<Vec<TimerDefinition>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM timers WHERE groupid = ?1 ORDER BY channelid, timerid",
            COLUMNS
        ))?;
        let definitions = stmt
            .query_map(params![group as i64], TimerDefinition::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(definitions)
    }

    pub fn update_channel(&self, id: TimerId, channel: ChannelId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(UPDATE_CHANNEL, params![id as i64, channel as i64])?;
        Ok(())
    }

    /// Deletes the definition; returns whether a row was removed.
    pub fn delete(&self, id: TimerId) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute(DELETE_TIMER, params![id as i64])?;
        Ok(removed > 0)
    }
}
