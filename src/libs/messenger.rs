//! Chat platform capability used by the engine.
//!
//! Timers and channel aggregators never talk to a chat client directly.
//! Everything outward-facing (posting and editing messages, pinning, reaction
//! markers, direct messages, renaming the voice label, granting and revoking
//! the membership tag, audio alerts) goes through a [`Messenger`] injected via
//! the [`EngineContext`](crate::libs::engine::EngineContext).
//!
//! Failures are typed so callers can degrade locally: a `Forbidden` post stops
//! the timer, a `NotFound` pinned message is forgotten and recreated, and a
//! `Transient` failure skips one delivery.

use crate::libs::engine::{ChannelId, GroupId, LabelId, MemberId, MessageId, TimerId};
use crate::libs::messages::Message;
use crate::msg_print;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Reaction marker that subscribes the reacting member.
pub const JOIN_MARKER: &str = "✅";
/// Reaction marker that unsubscribes the reacting member.
pub const LEAVE_MARKER: &str = "❌";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessengerError {
    #[error("missing permission: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient failure: {0}")]
    Transient(String),
}

pub type MessengerResult<T> = Result<T, MessengerError>;

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Posts `text` to `channel`, returning the new message id.
    async fn post(&self, channel: ChannelId, text: &str) -> MessengerResult<MessageId>;

    async fn edit(&self, channel: ChannelId, message: MessageId, text: &str) -> MessengerResult<()>;

    async fn pin(&self, channel: ChannelId, message: MessageId) -> MessengerResult<()>;

    /// Adds reaction markers to a message, in order.
    async fn add_markers(&self, channel: ChannelId, message: MessageId, markers: &[&str]) -> MessengerResult<()>;

    async fn direct_message(&self, member: MemberId, text: &str) -> MessengerResult<()>;

    /// Renames the label target (usually a voice channel) bound to a timer.
    async fn rename(&self, label: LabelId, name: &str) -> MessengerResult<()>;

    /// Grants the timer's membership tag to a member.
    async fn grant(&self, group: GroupId, member: MemberId, tag: TimerId) -> MessengerResult<()>;

    async fn revoke(&self, group: GroupId, member: MemberId, tag: TimerId) -> MessengerResult<()>;

    async fn play_alert(&self, label: LabelId) -> MessengerResult<()>;
}

/// Messenger that prints every action to the console.
///
/// Used by `pomogroup run` to drive the engine without a chat platform.
#[derive(Debug)]
pub struct ConsoleMessenger {
    next_id: AtomicU64,
}

impl ConsoleMessenger {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1) }
    }
}

impl Default for ConsoleMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn post(&self, channel: ChannelId, text: &str) -> MessengerResult<MessageId> {
        let message = self.next_id.fetch_add(1, Ordering::SeqCst);
        msg_print!(Message::ConsolePost {
            channel,
            message,
            text: text.to_string(),
        });
        Ok(message)
    }

    async fn edit(&self, channel: ChannelId, message: MessageId, text: &str) -> MessengerResult<()> {
        msg_print!(Message::ConsoleEdit {
            channel,
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn pin(&self, channel: ChannelId, message: MessageId) -> MessengerResult<()> {
        msg_print!(Message::ConsolePin { channel, message });
        Ok(())
    }

    async fn add_markers(&self, _channel: ChannelId, message: MessageId, markers: &[&str]) -> MessengerResult<()> {
        msg_print!(Message::ConsoleMarkers {
            message,
            markers: markers.join(" "),
        });
        Ok(())
    }

    async fn direct_message(&self, member: MemberId, text: &str) -> MessengerResult<()> {
        msg_print!(Message::ConsoleDirect {
            member,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn rename(&self, label: LabelId, name: &str) -> MessengerResult<()> {
        msg_print!(Message::ConsoleRename {
            label,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn grant(&self, _group: GroupId, member: MemberId, tag: TimerId) -> MessengerResult<()> {
        msg_print!(Message::ConsoleGrant { member, tag });
        Ok(())
    }

    async fn revoke(&self, _group: GroupId, member: MemberId, tag: TimerId) -> MessengerResult<()> {
        msg_print!(Message::ConsoleRevoke { member, tag });
        Ok(())
    }

    async fn play_alert(&self, label: LabelId) -> MessengerResult<()> {
        msg_print!(Message::ConsoleAlert(label));
        Ok(())
    }
}
