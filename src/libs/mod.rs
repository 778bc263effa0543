//! Core library modules for pomogroup.
//!
//! ## Features
//!
//! - **Engine**: patterns, timers, subscribers, channel aggregators and the
//!   orchestrator that ties them together
//! - **Persistence**: crash-safe runtime snapshots on top of the database
//! - **Integration**: the messenger capability and a console implementation
//! - **Infrastructure**: configuration, data storage, messages, formatting
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pomogroup::db::db::Db;
//! use pomogroup::libs::pattern::PatternRegistry;
//!
//! let registry = PatternRegistry::new(&Db::new()?, 1000);
//! let pattern = registry.parse("25/5/25/5/25/15", None, None)?;
//! println!("{}", pattern.display(None, None));
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod channel;
pub mod clock;
pub mod config;
pub mod data_storage;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod lfu;
pub mod messages;
pub mod messenger;
pub mod orchestrator;
pub mod pattern;
pub mod snapshot;
pub mod subscriber;
pub mod timer;
pub mod view;
