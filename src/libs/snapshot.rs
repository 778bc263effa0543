//! Crash-safe snapshots of the engine's runtime state.
//!
//! Timer definitions are durable in the database, but where each timer is
//! in its pattern, who is subscribed and how far their sessions have come
//! only exist in memory. The orchestrator serialises all of it into one JSON
//! file every persistence tick and on shutdown, and overlays it back on the
//! freshly loaded timers at startup.
//!
//! ## File Rotation
//!
//! A write goes to `<file>.tmp` first, the current file is kept as
//! `<file>.old`, and the temporary file is renamed into place. Writes with a
//! reason (such as `shutdown`) also leave a copy at `<file>.<reason>`.
//! A file that cannot be parsed is moved to `<file>.corrupt` and ignored.

use crate::libs::data_storage::DataStorage;
use crate::libs::engine::{ChannelId, GroupId, MemberId, MessageId, TimerId};
use crate::libs::messages::Message;
use crate::libs::subscriber::{NotifyLevel, Session, Subscriber};
use crate::libs::timer::TimerState;
use crate::msg_warning;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FILE_NAME: &str = "timerstatus.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberSnapshot {
    pub member: MemberId,
    pub name: String,
    pub last_seen: i64,
    pub warnings: u32,
    pub clocked_time: i64,
    pub notify_level: NotifyLevel,
    pub session: Option<Session>,
}

impl From<&Subscriber> for SubscriberSnapshot {
    fn from(subscriber: &Subscriber) -> Self {
        Self {
            member: subscriber.member,
            name: subscriber.name.clone(),
            last_seen: subscriber.last_seen,
            warnings: subscriber.warnings,
            clocked_time: subscriber.clocked_time,
            notify_level: subscriber.notify_level,
            session: subscriber.session.clone(),
        }
    }
}

impl SubscriberSnapshot {
    pub fn to_subscriber(&self, timer: TimerId) -> Subscriber {
        Subscriber {
            member: self.member,
            timer,
            name: self.name.clone(),
            last_seen: self.last_seen,
            warnings: self.warnings,
            clocked_time: self.clocked_time,
            notify_level: self.notify_level,
            session: self.session.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub id: TimerId,
    pub state: TimerState,
    pub pattern_id: Option<String>,
    pub stage_index: usize,
    pub stage_start: i64,
    pub message_ids: Vec<MessageId>,
    pub last_label_update: i64,
    pub subscribers: Vec<SubscriberSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub channel: ChannelId,
    pub pinned_message: Option<MessageId>,
    pub timers: Vec<TimerSnapshot>,
}

/// Every channel of every group.
pub type Snapshot = BTreeMap<GroupId, Vec<ChannelSnapshot>>;

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store in the application data directory.
    pub fn in_data_dir() -> Result<Self> {
        Ok(Self::new(DataStorage::new().get_path(SNAPSHOT_FILE_NAME)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<file>.<suffix>` next to the snapshot file.
    pub fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn write(&self, snapshot: &Snapshot, reason: Option<&str>) -> Result<()> {
        let tmp = self.sibling("tmp");
        fs::write(&tmp, serde_json::to_string_pretty(snapshot)?)?;
        if self.path.exists() {
            fs::rename(&self.path, self.sibling("old"))?;
        }
        fs::rename(&tmp, &self.path)?;
        if let Some(reason) = reason {
            fs::copy(&self.path, self.sibling(reason))?;
        }
        Ok(())
    }

    /// Reads the snapshot, if there is a readable one.
    pub fn read(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                let corrupt = self.sibling("corrupt");
                tracing::debug!(error = %e, "snapshot unreadable");
                fs::rename(&self.path, &corrupt)?;
                msg_warning!(Message::SnapshotCorrupt(corrupt.display().to_string()));
                Ok(None)
            }
        }
    }
}
