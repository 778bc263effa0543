//! The group timer state machine.
//!
//! A [`Timer`] repeats the stages of its current pattern for one group,
//! announcing every stage change in its notification channel, running the
//! inactivity policy over its subscribers and crediting their sessions.
//!
//! ## Concurrency
//!
//! All mutable state sits in one `parking_lot` mutex that is never held
//! across an `.await`: each operation captures what it needs under the lock,
//! releases it, and only then talks to the messenger. A running timer owns
//! exactly one loop task. The task is tied to a generation number; starting
//! the timer again bumps the generation and wakes the previous task, which
//! finishes whatever transition it is in and exits, so a stale loop can never
//! drive the timer. The loop's only suspension point is
//! a `select!` over a sleep and a [`Notify`] that `stop`, `shift`, `skip` and
//! `sync_with` use to make it re-evaluate immediately.
//!
//! ## States
//!
//! | State | Meaning |
//! |---|---|
//! | `Unset` | no pattern yet |
//! | `Stopped` | pattern set, not counting down |
//! | `Running` | loop active, sessions open |
//! | `Paused` | shown as paused; only reachable through a restored snapshot |

use crate::db::members::Members;
use crate::db::patterns::Patterns;
use crate::db::sessions::{SessionRecord, Sessions};
use crate::db::timers::{TimerDefinition, Timers};
use crate::libs::engine::{ChannelId, EngineContext, GroupId, LabelId, MemberId, MessageId, TimerId};
use crate::libs::error::EngineError;
use crate::libs::formatter::{format_seconds, mention_member, mention_tag};
use crate::libs::messages::Message;
use crate::libs::messenger::{MessengerError, JOIN_MARKER, LEAVE_MARKER};
use crate::libs::pattern::Pattern;
use crate::libs::snapshot::{SubscriberSnapshot, TimerSnapshot};
use crate::libs::subscriber::{Activity, SessionContext, Subscriber};
use crate::msg_error;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    Unset,
    Stopped,
    Running,
    Paused,
}

/// Flags of a stage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageChange {
    /// Announce the change in the timer channel.
    pub post: bool,
    /// Run the inactivity policy against the leaving stage.
    pub inactivity_check: bool,
    /// The leaving stage ran to completion.
    pub finished_old: bool,
}

impl StageChange {
    /// A stage ending on schedule.
    pub const NATURAL: StageChange = StageChange {
        post: true,
        inactivity_check: true,
        finished_old: true,
    };

    /// Stage 0 announced when the timer starts.
    pub const START: StageChange = StageChange {
        post: true,
        inactivity_check: false,
        finished_old: false,
    };
}

/// What a stage change computed under the lock.
enum Transition {
    /// No subscribers: nothing to announce.
    Unattended { stale: bool, auto_reset: bool },
    Announced {
        text: String,
        channel: ChannelId,
        stale: bool,
        voice_alert: bool,
        label_target: Option<LabelId>,
    },
}

struct TimerInner {
    definition: TimerDefinition,
    state: TimerState,
    pattern: Option<Arc<Pattern>>,
    stage_index: usize,
    stage_start: i64,
    subscribers: BTreeMap<MemberId, Subscriber>,
    message_ids: VecDeque<MessageId>,
    last_label_update: i64,
    last_label_text: Option<String>,
}

impl TimerInner {
    fn current_stage_seconds(&self) -> Option<i64> {
        self.pattern
            .as_ref()
            .and_then(|p| p.stages.get(self.stage_index))
            .map(|s| s.seconds())
    }

    /// Remaining seconds of the current stage, negative when overdue.
    fn remaining_raw(&self, now: i64) -> i64 {
        self.current_stage_seconds()
            .map(|secs| secs - (now - self.stage_start))
            .unwrap_or(0)
    }
}

pub struct Timer {
    id: TimerId,
    group: GroupId,
    ctx: EngineContext,
    inner: Mutex<TimerInner>,
    wake: Notify,
    generation: AtomicU64,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    pub fn new(definition: TimerDefinition, ctx: EngineContext) -> Arc<Timer> {
        Arc::new(Timer {
            id: definition.id,
            group: definition.group,
            ctx,
            inner: Mutex::new(TimerInner {
                definition,
                state: TimerState::Unset,
                pattern: None,
                stage_index: 0,
                stage_start: 0,
                subscribers: BTreeMap::new(),
                message_ids: VecDeque::new(),
                last_label_update: 0,
                last_label_text: None,
            }),
            wake: Notify::new(),
            generation: AtomicU64::new(0),
            loop_handle: Mutex::new(None),
        })
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn channel(&self) -> ChannelId {
        self.inner.lock().definition.channel
    }

    pub fn name(&self) -> String {
        self.inner.lock().definition.name.clone()
    }

    pub fn definition(&self) -> TimerDefinition {
        self.inner.lock().definition.clone()
    }

    pub fn state(&self) -> TimerState {
        self.inner.lock().state
    }

    pub fn pattern(&self) -> Option<Arc<Pattern>> {
        self.inner.lock().pattern.clone()
    }

    pub fn stage_index(&self) -> usize {
        self.inner.lock().stage_index
    }

    pub fn stage_start(&self) -> i64 {
        self.inner.lock().stage_start
    }

    /// Seconds left in the current stage, never negative.
    pub fn remaining(&self) -> i64 {
        self.inner.lock().remaining_raw(self.ctx.now()).max(0)
    }

    pub fn label_target(&self) -> Option<LabelId> {
        self.inner.lock().definition.label_target
    }

    pub fn is_subscribed(&self, member: MemberId) -> bool {
        self.inner.lock().subscribers.contains_key(&member)
    }

    pub fn subscriber(&self, member: MemberId) -> Option<Subscriber> {
        self.inner.lock().subscribers.get(&member).cloned()
    }

    pub fn subscribers(&self) -> Vec<Subscriber> {
        self.inner.lock().subscribers.values().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn message_ids(&self) -> Vec<MessageId> {
        self.inner.lock().message_ids.iter().copied().collect()
    }

    /// Whether `message` is one of the recent announcements of this timer.
    pub fn tracks_message(&self, message: MessageId) -> bool {
        self.inner.lock().message_ids.contains(&message)
    }

    pub(crate) fn set_channel(&self, channel: ChannelId) {
        self.inner.lock().definition.channel = channel;
    }

    /// The timer's default pattern, or the engine default when it has none.
    pub fn default_pattern(&self) -> Result<Arc<Pattern>, EngineError> {
        let default_id = self.inner.lock().definition.default_pattern.clone();
        match default_id {
            Some(id) => Ok(self.ctx.patterns.get(&id)?),
            None => self.ctx.patterns.parse(&self.ctx.config.default_pattern, None, None),
        }
    }

    /// Session context for the timer's current position.
    fn session_context<'a>(inner: &TimerInner, group: GroupId, pattern: &'a Pattern, now: i64, min_duration: i64) -> SessionContext<'a> {
        SessionContext {
            group,
            running: inner.state == TimerState::Running,
            stage_index: inner.stage_index,
            stage_start: inner.stage_start,
            pattern,
            now,
            min_duration,
        }
    }

    fn min_session(&self) -> i64 {
        self.ctx.config.min_session_duration as i64
    }

    fn persist_sessions(&self, records: Vec<SessionRecord>) {
        if records.is_empty() {
            return;
        }
        let sessions = Sessions::new(&self.ctx.db);
        for record in records {
            if let Err(e) = sessions.insert(&record) {
                msg_error!(Message::SessionSaveFailed(e.to_string()));
            }
        }
    }

    /// Sets up `pattern` (or the default pattern), leaving the timer stopped
    /// at the start of the first stage.
    pub fn setup(&self, pattern: Option<Arc<Pattern>>, actor: Option<MemberId>) -> Result<(), EngineError> {
        let pattern = match pattern {
            Some(pattern) => pattern,
            None => self.default_pattern()?,
        };
        tracing::debug!(timer = self.id, pattern = %pattern.id, "setting up timer");

        self.stop();
        let now = self.ctx.now();
        {
            let mut inner = self.inner.lock();
            inner.pattern = Some(Arc::clone(&pattern));
            inner.stage_index = 0;
            inner.stage_start = now;
            inner.state = TimerState::Stopped;
        }

        if let Err(e) = Patterns::new(&self.ctx.db).record_change(self.id, &pattern.id, actor, now) {
            msg_error!(Message::HistorySaveFailed(e.to_string()));
        }
        Ok(())
    }

    /// Starts the timer from the first stage, replacing any running loop.
    pub async fn start(self: &Arc<Self>) -> Result<(), EngineError> {
        if self.pattern().is_none() {
            self.setup(None, None)?;
        }
        if self.state() == TimerState::Running {
            self.stop();
        }
        tracing::debug!(timer = self.id, "starting timer");

        self.change_stage(0, StageChange::START).await?;

        let now = self.ctx.now();
        let mut records = Vec::new();
        {
            let mut inner = self.inner.lock();
            inner.state = TimerState::Running;
            if let Some(pattern) = inner.pattern.clone() {
                let session = Self::session_context(&inner, self.group, &pattern, now, self.min_session());
                for subscriber in inner.subscribers.values_mut() {
                    records.extend(subscriber.new_session(&session));
                }
            }
        }
        self.persist_sessions(records);
        self.spawn_loop();
        Ok(())
    }

    /// Stops a running or paused timer, closing every open session. A timer
    /// without a pattern stays `Unset`.
    pub fn stop(&self) {
        let now = self.ctx.now();
        let mut records = Vec::new();
        {
            let mut inner = self.inner.lock();
            if matches!(inner.state, TimerState::Stopped | TimerState::Unset) {
                return;
            }
            tracing::debug!(timer = self.id, "stopping timer");
            if let Some(pattern) = inner.pattern.clone() {
                let session = Self::session_context(&inner, self.group, &pattern, now, self.min_session());
                for subscriber in inner.subscribers.values_mut() {
                    records.extend(subscriber.close_session(&session));
                }
            }
            inner.state = TimerState::Stopped;
        }
        self.wake.notify_one();
        self.persist_sessions(records);
    }

    /// Moves to stage `target` (modulo the pattern length).
    pub async fn change_stage(&self, target: usize, change: StageChange) -> Result<(), EngineError> {
        let now = self.ctx.now();
        let config = &self.ctx.config;

        let mut records = Vec::new();
        let mut removed: Vec<Subscriber> = Vec::new();
        let mut directs: Vec<(MemberId, String)> = Vec::new();

        let transition = {
            let mut inner = self.inner.lock();
            let pattern = inner.pattern.clone().ok_or(EngineError::NotSetUp)?;
            let old_index = inner.stage_index.min(pattern.stages.len() - 1);
            let old_stage = pattern.stages[old_index].clone();

            let (transition_at, stale) = if change.finished_old {
                let nominal = inner.stage_start + old_stage.seconds();
                (nominal, (nominal - now).abs() > config.stale_transition_window as i64)
            } else {
                (now, false)
            };

            inner.stage_index = target % pattern.stages.len();
            inner.stage_start = transition_at;
            let new_stage = pattern.stages[inner.stage_index].clone();
            tracing::debug!(
                timer = self.id,
                from = old_index,
                to = inner.stage_index,
                stale,
                "changing stage"
            );

            if inner.subscribers.is_empty() {
                Transition::Unattended {
                    stale,
                    auto_reset: inner.definition.auto_reset && change.finished_old,
                }
            } else {
                if change.finished_old {
                    for subscriber in inner.subscribers.values_mut() {
                        subscriber.stage_finished(old_index);
                    }
                }

                let mut activity = BTreeMap::new();
                if change.inactivity_check {
                    for subscriber in inner.subscribers.values_mut() {
                        let outcome = subscriber.check_activity(transition_at, old_stage.seconds(), config.max_warnings);
                        activity.insert(subscriber.member, outcome);
                    }
                }
                let members_with = |wanted: Activity| -> Vec<MemberId> {
                    activity
                        .iter()
                        .filter(|(_, outcome)| **outcome == wanted)
                        .map(|(member, _)| *member)
                        .collect()
                };
                let warned = members_with(Activity::Warned);
                let kicked = members_with(Activity::Removed);

                let finished = if change.finished_old {
                    Message::StageFinished(old_stage.name.clone()).to_string()
                } else {
                    String::new()
                };
                let main_line = format!(
                    "{}{}",
                    finished,
                    Message::StageStarting {
                        name: new_stage.name.clone(),
                        duration: new_stage.duration,
                        message: new_stage.message.clone(),
                    }
                );

                let mut announcement = format!("{} {}\n", mention_tag(self.id), main_line);
                if !inner.definition.compact {
                    announcement.push_str(&format!("{}\n", Message::PleaseRespond));
                }
                if !warned.is_empty() {
                    announcement.push_str(&format!("{}\n", Message::InactivityWarning(mentions(&warned))));
                }
                if !kicked.is_empty() {
                    announcement.push_str(&format!("{}\n", Message::InactivityRemoved(mentions(&kicked))));
                }

                let timer_name = inner.definition.name.clone();
                let channel = inner.definition.channel;
                let session = Self::session_context(&inner, self.group, &pattern, now, self.min_session());
                for member in &kicked {
                    if let Some(mut subscriber) = inner.subscribers.remove(member) {
                        records.extend(subscriber.close_session(&session));
                        if subscriber.wants_direct(Activity::Removed) {
                            directs.push((
                                subscriber.member,
                                Message::DirectRemoved {
                                    timer: timer_name.clone(),
                                    channel,
                                    clocked: subscriber.pretty_clocked(),
                                }
                                .to_string(),
                            ));
                        }
                        removed.push(subscriber);
                    }
                }
                for subscriber in inner.subscribers.values() {
                    let text = if warned.contains(&subscriber.member) {
                        subscriber.wants_direct(Activity::Warned).then(|| Message::DirectWarning {
                            timer: timer_name.clone(),
                            channel,
                            main_line: main_line.clone(),
                        })
                    } else {
                        subscriber.wants_direct(Activity::Active).then(|| Message::DirectStatus {
                            timer: timer_name.clone(),
                            channel,
                            main_line: main_line.clone(),
                        })
                    };
                    if let Some(text) = text {
                        directs.push((subscriber.member, text.to_string()));
                    }
                }

                Transition::Announced {
                    text: announcement,
                    channel,
                    stale,
                    voice_alert: inner.definition.voice_alert,
                    label_target: inner.definition.label_target,
                }
            }
        };

        let (announcement, channel, stale, voice_alert, label_target) = match transition {
            Transition::Unattended { stale, auto_reset } => {
                if !stale {
                    self.update_label().await;
                }
                if auto_reset {
                    self.setup(None, None)?;
                }
                return Ok(());
            }
            Transition::Announced {
                text,
                channel,
                stale,
                voice_alert,
                label_target,
            } => (text, channel, stale, voice_alert, label_target),
        };

        self.persist_sessions(records);

        let post = change.post && !stale;
        if post {
            if let Some(message) = self.post(channel, &announcement).await {
                {
                    let mut inner = self.inner.lock();
                    inner.message_ids.push_back(message);
                    while inner.message_ids.len() > config.message_history {
                        inner.message_ids.pop_front();
                    }
                }
                if let Err(e) = self
                    .ctx
                    .messenger
                    .add_markers(channel, message, &[JOIN_MARKER, LEAVE_MARKER])
                    .await
                {
                    tracing::debug!(timer = self.id, error = %e, "could not add markers");
                }
            }
        }

        for subscriber in &removed {
            if let Err(e) = self.ctx.messenger.revoke(self.group, subscriber.member, self.id).await {
                tracing::debug!(timer = self.id, member = subscriber.member, error = %e, "could not revoke tag");
            }
        }
        for (member, text) in directs {
            if let Err(e) = self.ctx.messenger.direct_message(member, &text).await {
                tracing::debug!(timer = self.id, member, error = %e, "could not deliver direct message");
            }
        }

        if let (true, Some(label), true, true) = (voice_alert, label_target, change.finished_old, post) {
            if let Err(e) = self.ctx.messenger.play_alert(label).await {
                tracing::debug!(timer = self.id, error = %e, "could not play alert");
            }
        }
        if !stale {
            self.update_label().await;
        }
        Ok(())
    }

    /// Posts to `channel`; a permission failure stops the timer.
    async fn post(&self, channel: ChannelId, text: &str) -> Option<MessageId> {
        match self.ctx.messenger.post(channel, text).await {
            Ok(message) => Some(message),
            Err(MessengerError::Forbidden(reason)) => {
                tracing::debug!(timer = self.id, %reason, "posting forbidden, stopping timer");
                self.stop();
                None
            }
            Err(e) => {
                tracing::debug!(timer = self.id, error = %e, "post failed");
                None
            }
        }
    }

    /// Renames the label target, at most once per update interval and only
    /// when the rendered text changed.
    pub async fn update_label(&self) {
        let now = self.ctx.now();
        let (label, text) = {
            let mut inner = self.inner.lock();
            if inner.state != TimerState::Running {
                return;
            }
            let Some(label) = inner.definition.label_target else {
                return;
            };
            if now - inner.last_label_update < self.ctx.config.label_update_interval as i64 {
                return;
            }
            let Some(text) = Self::render_label(&inner, now) else {
                return;
            };
            if inner.last_label_text.as_deref() == Some(text.as_str()) {
                return;
            }
            inner.last_label_update = now;
            (label, text)
        };

        match self.ctx.messenger.rename(label, &text).await {
            Ok(()) => self.inner.lock().last_label_text = Some(text),
            Err(e) => tracing::debug!(timer = self.id, error = %e, "label rename failed"),
        }
    }

    fn render_label(inner: &TimerInner, now: i64) -> Option<String> {
        let pattern = inner.pattern.as_ref()?;
        let stage = pattern.stages.get(inner.stage_index)?;
        Some(
            inner
                .definition
                .label_format
                .replace("{stage_name}", &stage.name)
                .replace("{remaining}", &format_seconds(inner.remaining_raw(now), false))
                .replace("{name}", &inner.definition.name)
                .replace("{stage_dur}", &format_seconds(stage.seconds(), false))
                .replace("{sub_count}", &inner.subscribers.len().to_string())
                .replace("{pattern}", &pattern.display(Some(true), Some(6))),
        )
    }

    /// The current label text, if the timer is set up.
    pub fn label_text(&self) -> Option<String> {
        let inner = self.inner.lock();
        Self::render_label(&inner, self.ctx.now())
    }

    /// Moves the timer `offset` seconds forward in time (backwards when
    /// negative). Without an offset, aligns the stage start to the nearest
    /// hour boundary.
    pub fn shift(&self, offset: Option<i64>) -> Result<(), EngineError> {
        let now = self.ctx.now();
        {
            let mut inner = self.inner.lock();
            if inner.state != TimerState::Running {
                return Err(EngineError::NotRunning);
            }
            let pattern = inner.pattern.clone().ok_or(EngineError::NotSetUp)?;

            let offset = offset.unwrap_or_else(|| {
                let past_hour = inner.stage_start.rem_euclid(3600);
                if past_hour > 1800 {
                    past_hour - 3600
                } else {
                    past_hour
                }
            });

            let mut residual = offset;
            let mut index = inner.stage_index;
            let mut first = true;
            loop {
                let stage_remaining = if first {
                    inner.remaining_raw(now)
                } else {
                    pattern.stages[index].seconds()
                };
                if residual >= stage_remaining {
                    first = false;
                    residual -= stage_remaining;
                    index = (index + 1) % pattern.stages.len();
                } else {
                    break;
                }
            }

            let (new_start, credits) = if first {
                (inner.stage_start - residual, vec![(inner.stage_index, -residual)])
            } else {
                (
                    now - residual,
                    vec![(inner.stage_index, now - inner.stage_start), (index, -residual)],
                )
            };
            for subscriber in inner.subscribers.values_mut() {
                for (stage, delta) in &credits {
                    subscriber.stage_shift(*stage, *delta);
                }
            }
            tracing::debug!(timer = self.id, offset, target = index, "shifting timer");
            inner.stage_index = index;
            inner.stage_start = new_start;
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Skips `count` stages so the loop announces the change a second later.
    pub fn skip(&self, count: usize) -> Result<(), EngineError> {
        let offset = {
            let inner = self.inner.lock();
            if inner.state != TimerState::Running {
                return Err(EngineError::NotRunning);
            }
            let pattern = inner.pattern.clone().ok_or(EngineError::NotSetUp)?;
            let len = pattern.stages.len();
            if count == 0 || count > len {
                return Err(EngineError::InvalidSkipCount { count, max: len });
            }
            let following: i64 = (0..count - 1)
                .map(|i| pattern.stages[(inner.stage_index + i + 1) % len].seconds())
                .sum();
            inner.remaining_raw(self.ctx.now()) + following - 1
        };
        self.shift(Some(offset))
    }

    /// Aligns this timer's stage start (or end, with `end`) with `other`.
    pub fn sync_with(&self, other: &Timer, end: bool) -> Result<(), EngineError> {
        let (other_start, other_seconds) = {
            let inner = other.inner.lock();
            if inner.state != TimerState::Running {
                return Err(EngineError::NotRunning);
            }
            (inner.stage_start, inner.current_stage_seconds().ok_or(EngineError::NotSetUp)?)
        };
        let (own_start, own_seconds) = {
            let inner = self.inner.lock();
            if inner.state != TimerState::Running {
                return Err(EngineError::NotRunning);
            }
            (inner.stage_start, inner.current_stage_seconds().ok_or(EngineError::NotSetUp)?)
        };

        let mut offset = own_start - other_start;
        if end {
            offset -= other_seconds - own_seconds;
        }
        self.shift(Some(offset))
    }

    /// Replaces the loop task with a fresh one.
    ///
    /// The previous task is retired through the generation counter, not
    /// aborted: a transition it is in the middle of still delivers its
    /// revokes and direct messages before the task exits.
    pub(crate) fn spawn_loop(self: &Arc<Self>) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.wake.notify_waiters();
        let timer = Arc::clone(self);
        let handle = tokio::spawn(async move { timer.run_loop(generation).await });
        *self.loop_handle.lock() = Some(handle);
    }

    async fn run_loop(self: Arc<Self>, generation: u64) {
        let cap = self.ctx.config.loop_wait_cap as i64;
        while self.generation.load(Ordering::SeqCst) == generation {
            let (state, remaining, next, has_subscribers) = {
                let inner = self.inner.lock();
                (
                    inner.state,
                    inner.remaining_raw(self.ctx.now()),
                    inner.stage_index + 1,
                    !inner.subscribers.is_empty(),
                )
            };
            if state != TimerState::Running {
                break;
            }

            if remaining <= 0 {
                if let Err(e) = self.change_stage(next, StageChange::NATURAL).await {
                    msg_error!(Message::StageChangeFailed {
                        timer: self.id,
                        error: e.to_string(),
                    });
                }
                continue;
            } else if remaining > cap && has_subscribers {
                self.update_label().await;
            }

            let wait = Duration::from_secs(remaining.min(cap) as u64);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.wake.notified() => {}
            }
        }
        tracing::debug!(timer = self.id, generation, "timer loop finished");
    }

    /// Subscribes `member`, granting the timer tag and optionally posting a welcome.
    ///
    /// An existing subscription of the same member is kept and touched.
    pub async fn subscribe(&self, member: MemberId, name: &str, post: bool) -> Result<(), EngineError> {
        if self.touch(member) {
            return Ok(());
        }

        let members = Members::new(&self.ctx.db);
        if let Err(e) = members.set_name(member, name) {
            tracing::debug!(timer = self.id, member, error = %e, "could not store member name");
        }
        let notify_level = members.notify_level(member).unwrap_or_default();

        let now = self.ctx.now();
        let (channel, welcome) = {
            let mut inner = self.inner.lock();
            if let Some(existing) = inner.subscribers.get_mut(&member) {
                existing.touch(now);
                return Ok(());
            }
            let mut subscriber = Subscriber::new(member, self.id, name, notify_level, now);
            if inner.state == TimerState::Running {
                if let Some(pattern) = inner.pattern.clone() {
                    let session = Self::session_context(&inner, self.group, &pattern, now, self.min_session());
                    subscriber.new_session(&session);
                }
            }
            inner.subscribers.insert(member, subscriber);

            let mut welcome = Message::Welcome {
                timer: inner.definition.name.clone(),
                member,
            }
            .to_string();
            welcome.push(if inner.definition.compact { ' ' } else { '\n' });
            match inner.state {
                TimerState::Running => {
                    if let Some(stage) = inner.pattern.as_ref().and_then(|p| p.stages.get(inner.stage_index)) {
                        welcome.push_str(
                            &Message::WelcomeRunning {
                                stage: stage.name.clone(),
                                remaining: format_seconds(inner.remaining_raw(now), true),
                                message: stage.message.clone(),
                            }
                            .to_string(),
                        );
                    }
                }
                TimerState::Stopped | TimerState::Unset => welcome.push_str(&Message::WelcomeStopped.to_string()),
                TimerState::Paused => {}
            }
            (inner.definition.channel, welcome)
        };

        if let Err(MessengerError::Forbidden(_)) = self.ctx.messenger.grant(self.group, member, self.id).await {
            let notice = Message::GrantForbidden { member, timer: self.id }.to_string();
            self.post(channel, &notice).await;
        }
        tracing::debug!(timer = self.id, member, "subscribed");

        if post {
            self.post(channel, &welcome).await;
        }
        Ok(())
    }

    /// Unsubscribes `member`, closing their session. Returns the old subscriber.
    pub async fn unsubscribe(&self, member: MemberId, post: bool) -> Result<Subscriber, EngineError> {
        let now = self.ctx.now();
        let (subscriber, record, channel) = {
            let mut inner = self.inner.lock();
            let mut subscriber = inner
                .subscribers
                .remove(&member)
                .ok_or(EngineError::NotSubscribed(member))?;
            let record = match inner.pattern.clone() {
                Some(pattern) => {
                    let session = Self::session_context(&inner, self.group, &pattern, now, self.min_session());
                    subscriber.close_session(&session)
                }
                None => None,
            };
            (subscriber, record, inner.definition.channel)
        };
        tracing::debug!(timer = self.id, member, "unsubscribed");

        self.persist_sessions(record.into_iter().collect());
        if let Err(e) = self.ctx.messenger.revoke(self.group, member, self.id).await {
            tracing::debug!(timer = self.id, member, error = %e, "could not revoke tag");
        }
        if post {
            let goodbye = Message::Goodbye {
                member,
                clocked: subscriber.pretty_clocked(),
            }
            .to_string();
            self.post(channel, &goodbye).await;
        }
        Ok(subscriber)
    }

    /// Marks `member` as active. Returns whether they are subscribed.
    pub fn touch(&self, member: MemberId) -> bool {
        let now = self.ctx.now();
        match self.inner.lock().subscribers.get_mut(&member) {
            Some(subscriber) => {
                subscriber.touch(now);
                true
            }
            None => false,
        }
    }

    /// Adds clocked seconds carried over from a previous subscription.
    pub fn credit_clocked(&self, member: MemberId, seconds: i64) {
        if let Some(subscriber) = self.inner.lock().subscribers.get_mut(&member) {
            subscriber.clocked_time += seconds;
        }
    }

    /// Stops the timer, unsubscribes everyone and deletes the definition.
    pub async fn destroy(&self) -> Result<(), EngineError> {
        tracing::debug!(timer = self.id, "destroying timer");
        self.stop();
        let members: Vec<MemberId> = self.inner.lock().subscribers.keys().copied().collect();
        for member in members {
            self.unsubscribe(member, false).await?;
        }
        let handle = self.loop_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::debug!(timer = self.id, error = %e, "timer loop ended abnormally");
            }
        }
        Timers::new(&self.ctx.db).delete(self.id)?;
        Ok(())
    }

    /// The status block shown in the channel's pinned message.
    pub fn status_string(&self, show_seconds: bool) -> String {
        let now = self.ctx.now();
        let inner = self.inner.lock();
        let names: Vec<&str> = inner.subscribers.values().map(|s| s.name.as_str()).collect();
        let members = if names.is_empty() {
            Message::NoMembers.to_string()
        } else {
            format!("```{}```", names.join(", "))
        };

        let pattern = match (&inner.pattern, inner.state) {
            (Some(pattern), state) if state != TimerState::Unset => pattern,
            _ => return format!("**{}**: {}\n{}", inner.definition.name, Message::TimerNotSetUp, members),
        };

        let running = matches!(inner.state, TimerState::Running | TimerState::Paused);
        let remaining = if running {
            format_seconds(inner.remaining_raw(now), show_seconds)
        } else {
            String::new()
        };
        let width = pattern.stages.iter().map(|s| s.name.chars().count()).max().unwrap_or(0);
        let stages = pattern
            .stages
            .iter()
            .enumerate()
            .map(|(i, stage)| {
                let current = running && i == inner.stage_index;
                format!(
                    "`{}{:>width$}:` {} min  {}",
                    if current { "->" } else { "\u{200b}  " },
                    stage.name,
                    stage.duration,
                    if current { format!("(**{}**)", remaining) } else { String::new() },
                    width = width
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let stage = if running {
            pattern.stages[inner.stage_index].name.clone()
        } else {
            Message::TimerNotRunning.to_string()
        };
        let paused = if inner.state == TimerState::Paused {
            format!(" {}", Message::TimerPausedMark)
        } else {
            String::new()
        };
        format!("**{}**: {} {}\n{}\n{}", inner.definition.name, stage, paused, stages, members)
    }

    /// One-line summary: name, state, member count and pattern.
    pub fn oneline_summary(&self) -> String {
        let (name, state, count, pattern) = {
            let inner = self.inner.lock();
            (
                inner.definition.name.clone(),
                inner.state,
                inner.subscribers.len(),
                inner.pattern.clone(),
            )
        };
        let status = match state {
            TimerState::Running => Message::SummaryRunning,
            TimerState::Paused => Message::SummaryPaused,
            TimerState::Stopped | TimerState::Unset => Message::SummaryStopped,
        };
        let pattern = pattern
            .or_else(|| self.default_pattern().ok())
            .map(|p| p.display(Some(true), None))
            .unwrap_or_default();
        Message::OnelineSummary {
            name,
            status: status.to_string(),
            members: if count > 0 { count.to_string() } else { "no".to_string() },
            pattern,
        }
        .to_string()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        let inner = self.inner.lock();
        TimerSnapshot {
            id: self.id,
            state: inner.state,
            pattern_id: inner.pattern.as_ref().map(|p| p.id.clone()),
            stage_index: inner.stage_index,
            stage_start: inner.stage_start,
            message_ids: inner.message_ids.iter().copied().collect(),
            last_label_update: inner.last_label_update,
            subscribers: inner.subscribers.values().map(SubscriberSnapshot::from).collect(),
        }
    }

    /// Overlays snapshotted runtime state and rebuilds the subscribers.
    ///
    /// The loop is not relaunched here; see [`Timer::resume`].
    pub fn restore_from(&self, snapshot: &TimerSnapshot) -> Result<(), EngineError> {
        let pattern = match &snapshot.pattern_id {
            Some(id) => Some(self.ctx.patterns.get(id)?),
            None if snapshot.state != TimerState::Unset => Some(self.default_pattern()?),
            None => None,
        };
        let stage_count = pattern.as_ref().map(|p| p.stages.len()).unwrap_or(1);

        let mut inner = self.inner.lock();
        inner.state = snapshot.state;
        inner.pattern = pattern;
        inner.stage_index = snapshot.stage_index % stage_count;
        inner.stage_start = snapshot.stage_start;
        inner.message_ids = snapshot.message_ids.iter().copied().collect();
        inner.last_label_update = snapshot.last_label_update;
        inner.subscribers = snapshot
            .subscribers
            .iter()
            .map(|s| (s.member, s.to_subscriber(self.id)))
            .collect();
        Ok(())
    }

    /// Relaunches the loop of a restored running timer.
    pub fn resume(self: &Arc<Self>) -> bool {
        if self.state() == TimerState::Running {
            self.spawn_loop();
            true
        } else {
            false
        }
    }
}

fn mentions(members: &[MemberId]) -> String {
    members.iter().map(|m| mention_member(*m)).collect::<Vec<_>>().join(", ")
}
