//! Members subscribed to a timer.
//!
//! A [`Subscriber`] tracks one member's activity (for the inactivity policy)
//! and their open session. A session keeps one [`StageTally`] per stage of
//! the timer's pattern: how many times the stage was completed, plus extra
//! seconds for partial stages (joining mid-stage, leaving early, shifts).
//! Focused time is derived from the tallies when the session closes.
//!
//! Subscribers do not hold a reference back to their timer. Operations that
//! need the timer's position receive a [`SessionContext`] captured under the
//! timer lock.

use crate::db::sessions::SessionRecord;
use crate::libs::engine::{GroupId, MemberId, TimerId};
use crate::libs::formatter::format_seconds;
use crate::libs::pattern::Pattern;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How much direct messaging a member wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
pub enum NotifyLevel {
    /// Never send direct messages.
    Never = 1,
    /// Only when removed for inactivity.
    Final = 2,
    /// Also for imminent-removal warnings.
    Warning = 3,
    /// Every stage change.
    All = 4,
}

impl Default for NotifyLevel {
    fn default() -> Self {
        NotifyLevel::Warning
    }
}

impl NotifyLevel {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            1 => Some(NotifyLevel::Never),
            2 => Some(NotifyLevel::Final),
            3 => Some(NotifyLevel::Warning),
            4 => Some(NotifyLevel::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyLevel::Never => "never",
            NotifyLevel::Final => "final",
            NotifyLevel::Warning => "warning",
            NotifyLevel::All => "all",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTally {
    pub completions: u32,
    /// Seconds beyond (or, when negative, short of) the completed stages.
    pub extra: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub started: i64,
    pub tallies: Vec<StageTally>,
}

/// Outcome of the inactivity check for one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Active,
    /// Will be removed at the next stage change unless they respond.
    Warned,
    Removed,
}

/// Timer position needed to open or close a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext<'a> {
    pub group: GroupId,
    pub running: bool,
    pub stage_index: usize,
    pub stage_start: i64,
    pub pattern: &'a Pattern,
    pub now: i64,
    /// Sessions not longer than this are not recorded.
    pub min_duration: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub member: MemberId,
    pub timer: TimerId,
    pub name: String,
    pub last_seen: i64,
    pub warnings: u32,
    /// Seconds of closed sessions during this subscription.
    pub clocked_time: i64,
    pub notify_level: NotifyLevel,
    pub session: Option<Session>,
}

impl Subscriber {
    pub fn new(member: MemberId, timer: TimerId, name: &str, notify_level: NotifyLevel, now: i64) -> Self {
        Self {
            member,
            timer,
            name: name.to_string(),
            last_seen: now,
            warnings: 0,
            clocked_time: 0,
            notify_level,
            session: None,
        }
    }

    pub fn touch(&mut self, now: i64) {
        self.last_seen = now;
        self.warnings = 0;
    }

    /// Opens a new session, closing (and returning) any open one first.
    ///
    /// When the timer is running, the current stage starts with the time
    /// already elapsed subtracted, so only the time actually present counts.
    pub fn new_session(&mut self, ctx: &SessionContext) -> Option<SessionRecord> {
        let closed = self.close_session(ctx);

        let mut tallies = vec![StageTally::default(); ctx.pattern.stages.len()];
        if ctx.running {
            if let Some(tally) = tallies.get_mut(ctx.stage_index) {
                tally.extra = ctx.stage_start - ctx.now;
            }
        }
        self.session = Some(Session {
            started: ctx.now,
            tallies,
        });
        closed
    }

    /// Closes the open session.
    ///
    /// Returns a record to persist when the session lasted longer than the
    /// minimum duration. Clocked time is credited either way.
    pub fn close_session(&mut self, ctx: &SessionContext) -> Option<SessionRecord> {
        let mut session = self.session.take()?;

        if ctx.running {
            if let Some(tally) = session.tallies.get_mut(ctx.stage_index) {
                tally.extra += ctx.now - ctx.stage_start;
            }
        }

        let duration = ctx.now - session.started;
        let focused_duration = session
            .tallies
            .iter()
            .zip(ctx.pattern.stages.iter())
            .filter(|(_, stage)| stage.focus)
            .map(|(tally, stage)| tally.completions as i64 * stage.seconds() + tally.extra)
            .sum();
        self.clocked_time += duration;

        (duration > ctx.min_duration).then(|| SessionRecord {
            member: self.member,
            group: ctx.group,
            timer: self.timer,
            start_time: session.started,
            duration,
            focused_duration,
            pattern_id: ctx.pattern.id.clone(),
            stages: session.tallies,
        })
    }

    pub fn stage_finished(&mut self, stage: usize) {
        if let Some(tally) = self.tally(stage) {
            tally.completions += 1;
        }
    }

    /// Credits `delta` seconds to `stage`.
    pub fn stage_shift(&mut self, stage: usize, delta: i64) {
        if let Some(tally) = self.tally(stage) {
            tally.extra += delta;
        }
    }

    fn tally(&mut self, stage: usize) -> Option<&mut StageTally> {
        self.session.as_mut().and_then(|s| s.tallies.get_mut(stage))
    }

    /// Applies the inactivity policy for a stage of `stage_seconds` ending at `now`.
    pub fn check_activity(&mut self, now: i64, stage_seconds: i64, max_warnings: u32) -> Activity {
        if self.warnings >= max_warnings {
            self.warnings += 1;
            Activity::Removed
        } else if now - self.last_seen > stage_seconds {
            self.warnings += 1;
            if self.warnings >= max_warnings {
                Activity::Warned
            } else {
                Activity::Active
            }
        } else {
            Activity::Active
        }
    }

    /// Whether a stage-change notice for `activity` should reach this member directly.
    pub fn wants_direct(&self, activity: Activity) -> bool {
        let required = match activity {
            Activity::Removed => NotifyLevel::Final,
            Activity::Warned => NotifyLevel::Warning,
            Activity::Active => NotifyLevel::All,
        };
        self.notify_level >= required
    }

    /// Seconds of the open session not yet credited to `clocked_time`.
    pub fn unsaved_time(&self, now: i64) -> i64 {
        self.session.as_ref().map(|s| now - s.started).unwrap_or(0)
    }

    pub fn pretty_clocked(&self) -> String {
        format_seconds(self.clocked_time, true)
    }
}
