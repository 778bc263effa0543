//! Registry of every timer across every group.
//!
//! The [`Orchestrator`] is the engine's entry point. It maps
//! group → channel → [`TimerChannel`] → timers, routes chat activity to the
//! right subscriber, enforces one subscription per member per group, and
//! owns the two background loops:
//!
//! - the **status loop**, refreshing the pinned message of every channel
//!   with a running timer, spread evenly over the status budget;
//! - the **persistence loop**, writing a full snapshot every save interval.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pomogroup::db::db::Db;
//! use pomogroup::libs::clock::SystemClock;
//! use pomogroup::libs::config::EngineConfig;
//! use pomogroup::libs::engine::EngineContext;
//! use pomogroup::libs::messenger::ConsoleMessenger;
//! use pomogroup::libs::orchestrator::Orchestrator;
//! use pomogroup::libs::snapshot::SnapshotStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let ctx = EngineContext::new(
//!     Arc::new(ConsoleMessenger::new()),
//!     Arc::new(SystemClock),
//!     Db::new()?,
//!     EngineConfig::default(),
//! );
//! let orchestrator = Orchestrator::new(ctx, SnapshotStore::in_data_dir()?);
//! orchestrator.load_timers()?;
//! orchestrator.restore()?;
//! orchestrator.launch();
//! # Ok(())
//! # }
//! ```

use crate::db::timers::{TimerDefinition, Timers};
use crate::libs::channel::TimerChannel;
use crate::libs::engine::{ChannelId, EngineContext, GroupId, LabelId, MemberId, MessageId, TimerId};
use crate::libs::error::EngineError;
use crate::libs::messages::Message;
use crate::libs::messenger::{JOIN_MARKER, LEAVE_MARKER};
use crate::libs::snapshot::{Snapshot, SnapshotStore};
use crate::libs::subscriber::Subscriber;
use crate::libs::timer::{Timer, TimerState};
use crate::{msg_debug, msg_error, msg_info};
use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

type Registry = BTreeMap<GroupId, BTreeMap<ChannelId, Arc<TimerChannel>>>;

pub struct Orchestrator {
    ctx: EngineContext,
    channels: RwLock<Registry>,
    /// Serialises subscription changes within a group across awaits.
    membership: Mutex<BTreeMap<GroupId, Arc<tokio::sync::Mutex<()>>>>,
    store: SnapshotStore,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(ctx: EngineContext, store: SnapshotStore) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            channels: RwLock::new(BTreeMap::new()),
            membership: Mutex::new(BTreeMap::new()),
            store,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Builds a timer for every stored definition.
    pub fn load_timers(&self) -> Result<usize> {
        self.ctx.patterns.preload()?;
        let definitions = Timers::new(&self.ctx.db).fetch_all()?;
        let count = definitions.len();
        for definition in definitions {
            self.register(definition);
        }
        msg_info!(Message::TimersLoaded(count));
        Ok(count)
    }

    fn register(&self, definition: TimerDefinition) -> Arc<Timer> {
        let (group, channel) = (definition.group, definition.channel);
        let timer = Timer::new(definition, self.ctx.clone());
        self.channel_entry(group, channel).add_timer(Arc::clone(&timer));
        timer
    }

    fn membership(&self, group: GroupId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.membership.lock().entry(group).or_default())
    }

    fn channel_entry(&self, group: GroupId, channel: ChannelId) -> Arc<TimerChannel> {
        let mut registry = self.channels.write();
        Arc::clone(
            registry
                .entry(group)
                .or_default()
                .entry(channel)
                .or_insert_with(|| Arc::new(TimerChannel::new(channel, self.ctx.clone()))),
        )
    }

    /// Stores and registers a new timer, replacing one with the same id.
    pub async fn create_timer(&self, definition: TimerDefinition) -> Result<Arc<Timer>, EngineError> {
        if self.fetch_timer(definition.id).is_some() {
            self.destroy_timer(definition.id).await?;
        }
        Timers::new(&self.ctx.db).upsert(&definition)?;
        msg_info!(Message::TimerCreated {
            id: definition.id,
            name: definition.name.clone(),
        });

        let (group, channel) = (definition.group, definition.channel);
        let timer = self.register(definition);
        if let Some(aggregator) = self.get_channel(group, channel) {
            aggregator.update(true).await;
        }
        Ok(timer)
    }

    /// Unsubscribes everyone, deletes the timer and refreshes its channel.
    pub async fn destroy_timer(&self, id: TimerId) -> Result<(), EngineError> {
        let timer = self.fetch_timer(id).ok_or(EngineError::UnknownTimer(id))?;
        let (group, channel) = (timer.group(), timer.channel());

        timer.destroy().await?;
        if let Some(aggregator) = self.get_channel(group, channel) {
            aggregator.remove_timer(id);
            aggregator.update(true).await;
            if aggregator.is_empty() {
                self.drop_channel(group, channel);
            }
        }
        msg_info!(Message::TimerDestroyed(id));
        Ok(())
    }

    fn drop_channel(&self, group: GroupId, channel: ChannelId) {
        let mut registry = self.channels.write();
        if let Some(channels) = registry.get_mut(&group) {
            channels.remove(&channel);
            if channels.is_empty() {
                registry.remove(&group);
            }
        }
    }

    /// Rebinds a timer to another notification channel.
    pub async fn move_timer(&self, id: TimerId, channel: ChannelId) -> Result<(), EngineError> {
        let timer = self.fetch_timer(id).ok_or(EngineError::UnknownTimer(id))?;
        let (group, previous) = (timer.group(), timer.channel());
        if previous == channel {
            return Ok(());
        }

        Timers::new(&self.ctx.db).update_channel(id, channel)?;
        if let Some(old) = self.get_channel(group, previous) {
            old.remove_timer(id);
            old.update(true).await;
            if old.is_empty() {
                self.drop_channel(group, previous);
            }
        }
        timer.set_channel(channel);
        let aggregator = self.channel_entry(group, channel);
        aggregator.add_timer(timer);
        aggregator.update(true).await;
        msg_info!(Message::TimerMoved { id, channel });
        Ok(())
    }

    pub fn fetch_timer(&self, id: TimerId) -> Option<Arc<Timer>> {
        self.channels
            .read()
            .values()
            .flat_map(|channels| channels.values())
            .find_map(|aggregator| aggregator.timer(id))
    }

    pub fn get_channel(&self, group: GroupId, channel: ChannelId) -> Option<Arc<TimerChannel>> {
        self.channels.read().get(&group)?.get(&channel).cloned()
    }

    pub fn channels(&self) -> Vec<Arc<TimerChannel>> {
        self.channels
            .read()
            .values()
            .flat_map(|channels| channels.values().cloned())
            .collect()
    }

    /// Timers of `group`, optionally limited to one channel.
    pub fn get_timers_in(&self, group: GroupId, channel: Option<ChannelId>) -> Vec<Arc<Timer>> {
        let registry = self.channels.read();
        let Some(channels) = registry.get(&group) else {
            return Vec::new();
        };
        channels
            .iter()
            .filter(|(id, _)| channel.map_or(true, |wanted| **id == wanted))
            .flat_map(|(_, aggregator)| aggregator.timers())
            .collect()
    }

    pub fn timers(&self) -> Vec<Arc<Timer>> {
        self.channels().iter().flat_map(|c| c.timers()).collect()
    }

    /// The timer `member` is subscribed to in `group`, with their subscriber.
    pub fn get_subscriber(&self, member: MemberId, group: GroupId) -> Option<(Arc<Timer>, Subscriber)> {
        self.get_timers_in(group, None)
            .into_iter()
            .find_map(|timer| timer.subscriber(member).map(|subscriber| (timer, subscriber)))
    }

    /// Subscribes `member` to a timer, leaving any other timer of the group first.
    pub async fn subscribe(&self, member: MemberId, name: &str, timer: TimerId, post: bool) -> Result<(), EngineError> {
        let target = self.fetch_timer(timer).ok_or(EngineError::UnknownTimer(timer))?;
        let membership = self.membership(target.group());
        let _guard = membership.lock().await;
        if let Some((current, _)) = self.get_subscriber(member, target.group()) {
            if current.id() == timer {
                current.touch(member);
                return Ok(());
            }
            current.unsubscribe(member, post).await?;
        }
        target.subscribe(member, name, post).await
    }

    pub async fn unsubscribe(&self, member: MemberId, group: GroupId, post: bool) -> Result<Subscriber, EngineError> {
        let membership = self.membership(group);
        let _guard = membership.lock().await;
        let (timer, _) = self
            .get_subscriber(member, group)
            .ok_or(EngineError::NotSubscribed(member))?;
        timer.unsubscribe(member, post).await
    }

    /// A chat message from `member` in `channel`.
    pub fn on_message(&self, group: GroupId, channel: ChannelId, member: MemberId) {
        if let Some((timer, _)) = self.get_subscriber(member, group) {
            if timer.channel() == channel {
                timer.touch(member);
            }
        }
    }

    /// A reaction by `member` on `message` in `channel`.
    ///
    /// Any reaction in the timer's channel counts as activity. The join and
    /// leave markers on a recent announcement subscribe and unsubscribe.
    pub async fn on_reaction(
        &self,
        group: GroupId,
        channel: ChannelId,
        message: MessageId,
        member: MemberId,
        name: &str,
        marker: &str,
    ) -> Result<(), EngineError> {
        self.on_message(group, channel, member);

        let Some(timer) = self
            .get_timers_in(group, Some(channel))
            .into_iter()
            .find(|t| t.tracks_message(message))
        else {
            return Ok(());
        };

        let membership = self.membership(group);
        let _guard = membership.lock().await;
        if marker == JOIN_MARKER && self.get_subscriber(member, group).is_none() {
            timer.subscribe(member, name, true).await?;
        } else if marker == LEAVE_MARKER && timer.is_subscribed(member) {
            timer.unsubscribe(member, true).await?;
        }
        Ok(())
    }

    /// `member` moved between voice channels (`None` meaning not connected).
    ///
    /// Leaving a tracked label target unsubscribes; joining one subscribes,
    /// carrying over clocked time when the member switched timers.
    pub async fn on_voice_update(
        &self,
        group: GroupId,
        member: MemberId,
        name: &str,
        before: Option<LabelId>,
        after: Option<LabelId>,
    ) -> Result<(), EngineError> {
        if before == after {
            return Ok(());
        }
        let membership = self.membership(group);
        let _guard = membership.lock().await;
        let by_label = |label: Option<LabelId>| -> Option<Arc<Timer>> {
            let label = label?;
            self.get_timers_in(group, None)
                .into_iter()
                .find(|t| t.label_target() == Some(label))
        };
        let left = by_label(before);
        let joined = by_label(after);

        let leave = left
            .as_ref()
            .filter(|t| t.is_subscribed(member) && t.definition().track_voice_leave);
        let join = joined.as_ref().filter(|t| {
            t.definition().track_voice_join && (leave.is_some() || self.get_subscriber(member, group).is_none())
        });

        let mut carried = None;
        if let Some(timer) = leave {
            carried = Some(timer.unsubscribe(member, join.is_none()).await?.clocked_time);
        }
        if let Some(timer) = join {
            timer.subscribe(member, name, true).await?;
            if let Some(clocked) = carried {
                timer.credit_clocked(member, clocked);
            }
        }
        Ok(())
    }

    pub async fn on_voice_join(&self, group: GroupId, member: MemberId, name: &str, label: LabelId) -> Result<(), EngineError> {
        self.on_voice_update(group, member, name, None, Some(label)).await
    }

    pub async fn on_voice_leave(&self, group: GroupId, member: MemberId, label: LabelId) -> Result<(), EngineError> {
        self.on_voice_update(group, member, "", Some(label), None).await
    }

    /// Forgets a group, stopping its timers. Definitions stay stored.
    pub fn unload_group(&self, group: GroupId) -> usize {
        let removed = self.channels.write().remove(&group).unwrap_or_default();
        let timers: Vec<Arc<Timer>> = removed.values().flat_map(|c| c.timers()).collect();
        for timer in &timers {
            timer.stop();
        }
        timers.len()
    }

    /// Starts every registered timer that is not running.
    pub async fn start_all(&self) -> usize {
        let mut started = 0;
        for timer in self.timers() {
            if timer.state() == TimerState::Running {
                continue;
            }
            match timer.start().await {
                Ok(()) => started += 1,
                Err(e) => msg_error!(Message::StageChangeFailed {
                    timer: timer.id(),
                    error: e.to_string(),
                }),
            }
        }
        msg_info!(Message::TimersStarted(started));
        started
    }

    pub fn snapshot(&self) -> Snapshot {
        self.channels
            .read()
            .iter()
            .map(|(group, channels)| (*group, channels.values().map(|c| c.snapshot()).collect()))
            .collect()
    }

    /// Writes a full snapshot, also copying it to `<file>.<reason>` when given.
    pub fn save(&self, reason: Option<&str>) -> Result<()> {
        let snapshot = self.snapshot();
        self.store.write(&snapshot, reason)?;
        msg_debug!(Message::SnapshotWritten(self.store.path().display().to_string()));
        Ok(())
    }

    /// Overlays the stored snapshot on the loaded timers, relaunching the
    /// running ones. Returns the number of restored timers.
    pub fn restore(&self) -> Result<usize> {
        let Some(snapshot) = self.store.read()? else {
            return Ok(0);
        };
        let mut restored = 0;
        for (group, channels) in &snapshot {
            for channel_snapshot in channels {
                if let Some(aggregator) = self.get_channel(*group, channel_snapshot.channel) {
                    restored += aggregator.restore_from(channel_snapshot);
                }
            }
        }
        msg_info!(Message::SnapshotRestored(restored));
        Ok(restored)
    }

    /// Spawns the status and persistence loops.
    pub fn launch(self: &Arc<Self>) {
        let status = tokio::spawn(Arc::clone(self).status_loop());
        let persistence = tokio::spawn(Arc::clone(self).persistence_loop());
        self.tasks.lock().extend([status, persistence]);
    }

    async fn status_loop(self: Arc<Self>) {
        let budget = self.ctx.config.status_budget as f64;
        let idle = Duration::from_secs(self.ctx.config.status_idle_sleep);
        loop {
            let active: Vec<Arc<TimerChannel>> = self.channels().into_iter().filter(|c| c.has_running()).collect();
            if active.is_empty() {
                tokio::time::sleep(idle).await;
                continue;
            }
            let spacing = Duration::from_secs_f64((budget / active.len() as f64).max(0.1));
            for aggregator in active {
                aggregator.update(false).await;
                tokio::time::sleep(spacing).await;
            }
        }
    }

    async fn persistence_loop(self: Arc<Self>) {
        let period = Duration::from_secs(self.ctx.config.save_interval.max(1));
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            if let Err(e) = self.save(None) {
                msg_error!(Message::SnapshotWriteFailed(e.to_string()));
            }
        }
    }

    /// Stops the background loops and writes a `shutdown` snapshot.
    pub fn shutdown(&self) -> Result<()> {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.save(Some("shutdown"))?;
        msg_info!(Message::EngineStopped);
        Ok(())
    }
}
