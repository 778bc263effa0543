//! Typed application messages and the macros that print them.
//!
//! Every piece of user-facing text, from chat announcements posted by a
//! running timer to console lines printed by the CLI, is a [`Message`]
//! variant rendered through its `Display` implementation.

pub mod display;
pub mod macros;
pub mod types;

pub use types::Message;
