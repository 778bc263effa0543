//! Typed errors raised by the timer engine.
//!
//! User-input problems (a malformed pattern, an unknown preset, skipping too
//! far, acting on a stopped timer) are reported as [`EngineError`] values and
//! are never retried. Storage failures are carried through as `anyhow` errors.
//! Messenger failures have their own type in [`crate::libs::messenger`].

use crate::libs::engine::{MemberId, TimerId};
use crate::libs::messages::Message;
use thiserror::Error;

/// A pattern string that could not be parsed.
///
/// The payload is the user-readable explanation naming the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvalidPattern(pub String);

impl InvalidPattern {
    pub fn new(message: Message) -> Self {
        Self(message.to_string())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidPattern(#[from] InvalidPattern),

    #[error("{}", unknown_preset(.0))]
    UnknownPreset(String),

    #[error("{}", invalid_skip(.count, .max))]
    InvalidSkipCount { count: usize, max: usize },

    #[error("{}", Message::TimerIsNotRunning)]
    NotRunning,

    #[error("{}", Message::TimerIsNotSetUp)]
    NotSetUp,

    #[error("{}", not_subscribed(.0))]
    NotSubscribed(MemberId),

    #[error("{}", unknown_timer(.0))]
    UnknownTimer(TimerId),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

fn unknown_preset(name: &str) -> Message {
    Message::PresetUnknown(name.to_string())
}

fn invalid_skip(count: &usize, max: &usize) -> Message {
    Message::InvalidSkipCount { count: *count, max: *max }
}

fn not_subscribed(member: &MemberId) -> Message {
    Message::MemberNotSubscribed(*member)
}

fn unknown_timer(timer: &TimerId) -> Message {
    Message::UnknownTimer(*timer)
}

impl From<rusqlite::Error> for EngineError {
    fn from(error: rusqlite::Error) -> Self {
        EngineError::Storage(error.into())
    }
}
