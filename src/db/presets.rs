//! Named pattern presets.
//!
//! A preset binds a short name to a pattern digest, either for one member or
//! for a whole group. When a bare name is given where a pattern is expected,
//! the member's presets are searched before the group's.

use crate::db::db::Db;
use crate::libs::engine::{GroupId, MemberId};
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetScope {
    Member(MemberId),
    Group(GroupId),
}

impl PresetScope {
    fn table(&self) -> &'static str {
        match self {
            PresetScope::Member(_) => "member_presets",
            PresetScope::Group(_) => "group_presets",
        }
    }

    fn owner_column(&self) -> &'static str {
        match self {
            PresetScope::Member(_) => "memberid",
            PresetScope::Group(_) => "groupid",
        }
    }

    fn owner(&self) -> i64 {
        match self {
            PresetScope::Member(id) | PresetScope::Group(id) => *id as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub scope: PresetScope,
    pub name: String,
    pub pattern_id: String,
}

pub struct Presets {
    conn: Arc<Mutex<Connection>>,
}

impl Presets {
    pub fn new(db: &Db) -> Self {
        Self { conn: Arc::clone(&db.conn) }
    }

    /// Saves a preset, replacing an existing one with the same name.
    pub fn save(&self, scope: PresetScope, name: &str, pattern_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO {} ({}, preset_name, patternid) VALUES (?1, ?2, ?3)",
                scope.table(),
                scope.owner_column()
            ),
            params![scope.owner(), name, pattern_id],
        )?;
        Ok(())
    }

    /// Pattern digest of the named preset, if any.
    pub fn fetch(&self, scope: PresetScope, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let pattern_id = conn
            .query_row(
                &format!(
                    "SELECT patternid FROM {} WHERE {} = ?1 AND preset_name = ?2",
                    scope.table(),
                    scope.owner_column()
                ),
                params![scope.owner(), name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(pattern_id)
    }

    pub fn list(&self, scope: PresetScope) -> Result<Vec<Preset>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT preset_name, patternid FROM {} WHERE {} = ?1 ORDER BY preset_name",
            scope.table(),
            scope.owner_column()
        ))?;
        let presets = stmt
            .query_map(params![scope.owner()], |row| {
                Ok(Preset {
                    scope,
                    name: row.get(0)?,
                    pattern_id: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(presets)
    }

    /// Deletes the named preset; returns whether it existed.
    pub fn delete(&self, scope: PresetScope, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND preset_name = ?2",
                scope.table(),
                scope.owner_column()
            ),
            params![scope.owner(), name],
        )?;
        Ok(removed > 0)
    }
}
