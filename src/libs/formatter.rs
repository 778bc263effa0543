//! Duration, timestamp and mention formatting.
//!
//! ## Duration Format
//!
//! Durations are rendered as `HH:MM` or, with seconds, `HH:MM:SS`:
//! - Hours and minutes are zero-padded to 2 digits
//! - Without seconds the value is rounded to the nearest minute
//! - Negative durations are treated as zero
//!
//! ### Examples
//! - 1500 seconds → "00:25"
//! - 5430 seconds with seconds shown → "01:30:30"
//! - -20 seconds → "00:00"
//!
//! ## Mentions
//!
//! Chat text addresses members, membership tags and channels with the
//! platform mention syntax produced by [`mention_member`], [`mention_tag`]
//! and [`mention_channel`].

use crate::libs::engine::{ChannelId, MemberId, TimerId};
use chrono::{Local, TimeZone};

/// Formats a number of seconds as `HH:MM` or `HH:MM:SS`.
pub fn format_seconds(seconds: i64, show_seconds: bool) -> String {
    let seconds = seconds.max(0);
    if show_seconds {
        format!("{:02}:{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60, seconds % 60)
    } else {
        // Round to the nearest whole minute
        let rounded = ((seconds + 30) / 60) * 60;
        format!("{:02}:{:02}", rounded / 3600, (rounded % 3600) / 60)
    }
}

/// Formats a unix timestamp in local time as `YYYY-MM-DD HH:MM`.
pub fn format_timestamp(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => timestamp.to_string(),
    }
}

pub fn mention_member(member: MemberId) -> String {
    format!("<@{}>", member)
}

pub fn mention_tag(tag: TimerId) -> String {
    format!("<@&{}>", tag)
}

pub fn mention_channel(channel: ChannelId) -> String {
    format!("<#{}>", channel)
}
