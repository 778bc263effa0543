//! Versioned schema migrations for the pomogroup database.
//!
//! Every schema change is a numbered [`Migration`] registered with the
//! [`MigrationManager`]. Pending migrations are applied in order inside one
//! transaction whenever a [`Db`](crate::db::db::Db) is opened, and each
//! applied version is recorded in the `migrations` table together with the
//! time it was applied.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pomogroup::db::migrations::{get_db_version, init_with_migrations};
//! use rusqlite::Connection;
//!
//! let mut conn = Connection::open("pomogroup.db")?;
//! init_with_migrations(&mut conn)?;
//! let version = get_db_version(&conn)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::libs::messages::Message;
use crate::{msg_debug, msg_error, msg_info, msg_success};
use anyhow::Result;
use rusqlite::{params, Connection, Transaction};

/// Bookkeeping table listing every applied migration.
const MIGRATIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS migrations (
    id INTEGER PRIMARY KEY,
    version INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// One schema change.
#[derive(Debug, Clone)]
struct Migration {
    version: u32,
    name: &'static str,
    /// Applies the change inside the migration transaction.
    up: fn(&Transaction) -> Result<()>,
}

/// Registry of all migrations, in version order.
pub struct MigrationManager {
    migrations: Vec<Migration>,
}

impl MigrationManager {
    pub fn new() -> Self {
        let mut manager = Self { migrations: Vec::new() };
        manager.register_migrations();
        manager
    }

    fn register_migrations(&mut self) {
        // Version 1: engine tables
        // Pattern rows are keyed by the digest of their stage sequence and are
        // never deleted by the engine; timers reference them by digest.
        self.add_migration(1, "create_engine_tables", |tx| {
            tx.execute(
                "CREATE TABLE IF NOT EXISTS patterns (
                    patternid TEXT NOT NULL PRIMARY KEY,
                    short_repr BOOLEAN NOT NULL DEFAULT FALSE,
                    stage_str TEXT NOT NULL,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )",
                [],
            )?;

            tx.execute(
                "CREATE TABLE IF NOT EXISTS timers (
                    timerid INTEGER NOT NULL PRIMARY KEY,
                    groupid INTEGER NOT NULL,
                    channelid INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    patternid TEXT,
                    label_target INTEGER,
                    voice_alert BOOLEAN NOT NULL DEFAULT FALSE,
                    auto_reset BOOLEAN NOT NULL DEFAULT FALSE,
                    compact BOOLEAN NOT NULL DEFAULT FALSE,
                    label_format TEXT NOT NULL DEFAULT '{name} - {stage_name} ({remaining})',
                    track_voice_join BOOLEAN NOT NULL DEFAULT TRUE,
                    track_voice_leave BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    FOREIGN KEY (patternid) REFERENCES patterns(patternid)
                )",
                [],
            )?;

            tx.execute(
                "CREATE TABLE IF NOT EXISTS timer_pattern_history (
                    id INTEGER PRIMARY KEY,
                    timerid INTEGER NOT NULL,
                    patternid TEXT NOT NULL,
                    modified_by INTEGER,
                    modified_at INTEGER NOT NULL
                )",
                [],
            )?;

            tx.execute(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY,
                    memberid INTEGER NOT NULL,
                    groupid INTEGER NOT NULL,
                    timerid INTEGER NOT NULL,
                    start_time INTEGER NOT NULL,
                    duration INTEGER NOT NULL,
                    focused_duration INTEGER NOT NULL,
                    patternid TEXT NOT NULL,
                    stages TEXT NOT NULL
                )",
                [],
            )?;

            tx.execute(
                "CREATE TABLE IF NOT EXISTS members (
                    memberid INTEGER NOT NULL PRIMARY KEY,
                    name TEXT,
                    notify_level INTEGER
                )",
                [],
            )?;

            Ok(())
        });

        // Version 2: named presets, scoped to a member or to a whole group
        self.add_migration(2, "add_presets", |tx| {
            tx.execute(
                "CREATE TABLE IF NOT EXISTS member_presets (
                    memberid INTEGER NOT NULL,
                    preset_name TEXT NOT NULL,
                    patternid TEXT NOT NULL,
                    PRIMARY KEY (memberid, preset_name),
                    FOREIGN KEY (patternid) REFERENCES patterns(patternid)
                )",
                [],
            )?;
            tx.execute(
                "CREATE TABLE IF NOT EXISTS group_presets (
                    groupid INTEGER NOT NULL,
                    preset_name TEXT NOT NULL,
                    patternid TEXT NOT NULL,
                    PRIMARY KEY (groupid, preset_name),
                    FOREIGN KEY (patternid) REFERENCES patterns(patternid)
                )",
                [],
            )?;
            Ok(())
        });

        // Version 3: lookup indices
        self.add_migration(3, "add_indices", |tx| {
            // Session listings filter by member and by group
            tx.execute("CREATE INDEX IF NOT EXISTS idx_sessions_member ON sessions(memberid)", [])?;
            tx.execute("CREATE INDEX IF NOT EXISTS idx_sessions_group ON sessions(groupid, start_time)", [])?;
            tx.execute("CREATE INDEX IF NOT EXISTS idx_timers_group ON timers(groupid)", [])?;
            tx.execute(
                "CREATE INDEX IF NOT EXISTS idx_pattern_history_timer ON timer_pattern_history(timerid, modified_at)",
                [],
            )?;
            Ok(())
        });
    }

    fn add_migration(&mut self, version: u32, name: &'static str, up: fn(&Transaction) -> Result<()>) {
        self.migrations.push(Migration { version, name, up });
    }

    /// Applies every migration newer than the recorded schema version.
    ///
    /// All pending migrations share one transaction: if any of them fails
    /// nothing is committed and the error is returned.
    pub fn run_migrations(&self, conn: &mut Connection) -> Result<()> {
        conn.execute(MIGRATIONS_TABLE, [])?;

        let current_version = self.get_current_version(conn)?;
        let pending: Vec<&Migration> = self.migrations.iter().filter(|m| m.version > current_version).collect();

        if pending.is_empty() {
            msg_debug!(Message::DatabaseUpToDate);
            return Ok(());
        }

        msg_info!(Message::MigrationsFound(pending.len()));

        let tx = conn.transaction()?;
        for migration in pending {
            msg_info!(Message::RunningMigration(migration.version, migration.name.to_string()));

            match (migration.up)(&tx) {
                Ok(()) => {
                    tx.execute(
                        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
                        params![migration.version, migration.name],
                    )?;
                    msg_success!(Message::MigrationCompleted(migration.version));
                }
                Err(e) => {
                    msg_error!(Message::MigrationFailed(migration.version, e.to_string()));
                    return Err(e);
                }
            }
        }

        tx.commit()?;
        msg_success!(Message::AllMigrationsCompleted);

        Ok(())
    }

    /// Highest applied version, or 0 for a fresh database.
    fn get_current_version(&self, conn: &Connection) -> Result<u32> {
        // A database that never ran migrations has no bookkeeping table yet
        let version: Option<u32> = conn
            .query_row("SELECT MAX(version) FROM migrations", [], |row| row.get(0))
            .unwrap_or(Some(0));

        Ok(version.unwrap_or(0))
    }

    pub fn latest_version(&self) -> u32 {
        self.migrations.last().map(|m| m.version).unwrap_or(0)
    }

    pub fn is_migration_applied(&self, conn: &Connection, version: u32) -> Result<bool> {
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM migrations WHERE version = ?1",
            params![version],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// Applied migrations as `(version, name, applied_at)`, oldest first.
    pub fn get_migration_history(&self, conn: &Connection) -> Result<Vec<(u32, String, String)>> {
        let mut stmt = conn.prepare("SELECT version, name, applied_at FROM migrations ORDER BY version")?;

        let history = stmt
            .query_map([], |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(history)
    }
}

impl Default for MigrationManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Brings `conn` up to the latest schema version.
pub fn init_with_migrations(conn: &mut Connection) -> Result<()> {
    MigrationManager::new().run_migrations(conn)
}

pub fn get_db_version(conn: &Connection) -> Result<u32> {
    MigrationManager::new().get_current_version(conn)
}

/// Whether `conn` is behind the latest registered migration.
pub fn needs_migration(conn: &Connection) -> Result<bool> {
    let manager = MigrationManager::new();
    let current = manager.get_current_version(conn)?;
    Ok(current < manager.latest_version())
}
