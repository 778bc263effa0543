//! # Pomogroup - group Pomodoro timers for chat communities
//!
//! An engine that runs many independent group timers side by side, each
//! cycling through a repeating pattern of named stages, and keeps the chat
//! in step with it.
//!
//! ## Features
//!
//! - **Patterns**: short (`25/5/25/15`) and long (`Study, 50*; Break, 10`)
//!   notation, content-addressed and cached, with member and group presets
//! - **Timers**: per-timer scheduling loops with stage announcements, label
//!   renaming, skipping, shifting and syncing
//! - **Members**: one subscription per group, inactivity warnings and
//!   removal, per-member notification levels, recorded study sessions
//! - **Status**: one pinned status message per channel, refreshed within a
//!   global budget
//! - **Recovery**: periodic snapshots restored at startup
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pomogroup::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod commands;
pub mod db;
pub mod libs;
