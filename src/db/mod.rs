//! Database layer for pomogroup.
//!
//! SQLite persistence for everything the engine keeps durably: timer
//! definitions, content-addressed patterns and their change history,
//! completed session records, named presets and per-member settings.
//! Transient runtime state (running stages, open sessions) is not stored
//! here; it goes to the snapshot file.
//!
//! Every table module wraps a clone of the shared [`db::Db`] connection:
//!
//! ```rust,no_run
//! use pomogroup::db::{db::Db, timers::{TimerDefinition, Timers}};
//!
//! let db = Db::new()?;
//! let timers = Timers::new(&db);
//! timers.upsert(&TimerDefinition::new(42, 1, 10, "Morning study"))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

/// Connection management.
pub mod db;

/// Versioned schema migrations.
pub mod migrations;

/// Member names and notification levels.
pub mod members;

/// Pattern rows keyed by digest, plus pattern-change history.
pub mod patterns;

/// Member- and group-scoped named presets.
pub mod presets;

/// Completed session records.
pub mod sessions;

/// Group timer definitions.
pub mod timers;
