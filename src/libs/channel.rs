//! Channel aggregators and the pinned status message.
//!
//! Every notification channel with at least one timer gets one
//! [`TimerChannel`]. It owns the channel's single pinned status message,
//! rendered from the status blocks of all its timers, and keeps it current
//! without flooding the channel: unchanged renders are skipped, a vanished
//! message is recreated on the next refresh, and repeated failures pause
//! refreshing until a forced update.

use crate::libs::engine::{ChannelId, EngineContext, MessageId, TimerId};
use crate::libs::messages::Message;
use crate::libs::messenger::MessengerError;
use crate::libs::snapshot::ChannelSnapshot;
use crate::libs::timer::{Timer, TimerState};
use crate::{msg_error, msg_warning};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Failure count that disables refreshing until a forced update.
pub const FORBIDDEN_FAILURES: u32 = 100;

#[derive(Debug, Default)]
struct PinState {
    pinned: Option<MessageId>,
    previous: String,
    failures: u32,
}

pub struct TimerChannel {
    channel: ChannelId,
    ctx: EngineContext,
    timers: RwLock<Vec<Arc<Timer>>>,
    pin: Mutex<PinState>,
    // Serialises refreshes so two callers never create two status messages.
    refresh: tokio::sync::Mutex<()>,
}

impl TimerChannel {
    pub fn new(channel: ChannelId, ctx: EngineContext) -> Self {
        Self {
            channel,
            ctx,
            timers: RwLock::new(Vec::new()),
            pin: Mutex::new(PinState::default()),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn timers(&self) -> Vec<Arc<Timer>> {
        self.timers.read().clone()
    }

    pub fn timer(&self, id: TimerId) -> Option<Arc<Timer>> {
        self.timers.read().iter().find(|t| t.id() == id).cloned()
    }

    pub fn add_timer(&self, timer: Arc<Timer>) {
        let mut timers = self.timers.write();
        timers.retain(|t| t.id() != timer.id());
        timers.push(timer);
    }

    pub fn remove_timer(&self, id: TimerId) -> Option<Arc<Timer>> {
        let mut timers = self.timers.write();
        let position = timers.iter().position(|t| t.id() == id)?;
        Some(timers.remove(position))
    }

    pub fn is_empty(&self) -> bool {
        self.timers.read().is_empty()
    }

    pub fn has_running(&self) -> bool {
        self.timers.read().iter().any(|t| t.state() == TimerState::Running)
    }

    pub fn pinned_message(&self) -> Option<MessageId> {
        self.pin.lock().pinned
    }

    pub fn failures(&self) -> u32 {
        self.pin.lock().failures
    }

    /// The full status text: a heading and each timer's block.
    pub fn render(&self) -> Option<String> {
        let body = self
            .timers()
            .iter()
            .map(|t| t.status_string(false))
            .collect::<Vec<_>>()
            .join("\n\n");
        if body.is_empty() {
            None
        } else {
            Some(format!("**{}**\n{}", Message::StatusTitle, body))
        }
    }

    /// Refreshes the pinned status message.
    pub async fn update(&self, force: bool) {
        let _refresh = self.refresh.lock().await;

        if !force && self.pin.lock().failures > self.ctx.config.pin_failure_threshold {
            return;
        }
        let Some(text) = self.render() else {
            return;
        };
        let pinned = {
            let pin = self.pin.lock();
            if pin.previous == text {
                return;
            }
            pin.pinned
        };

        match pinned {
            Some(message) => match self.ctx.messenger.edit(self.channel, message, &text).await {
                Ok(()) => {
                    let mut pin = self.pin.lock();
                    pin.previous = text;
                    pin.failures = 0;
                }
                Err(MessengerError::NotFound(_)) => {
                    self.pin.lock().pinned = None;
                }
                Err(e) => {
                    self.pin.lock().failures += 1;
                    msg_error!(Message::StatusUpdateFailed {
                        channel: self.channel,
                        error: e.to_string(),
                    });
                }
            },
            None => {
                let timers = self.timers();
                if !force && timers.iter().all(|t| t.state() == TimerState::Stopped) {
                    return;
                }
                self.create(text, &timers).await;
            }
        }
    }

    async fn create(&self, text: String, timers: &[Arc<Timer>]) {
        match self.ctx.messenger.post(self.channel, &text).await {
            Ok(message) => {
                {
                    let mut pin = self.pin.lock();
                    pin.pinned = Some(message);
                    pin.previous = text;
                    pin.failures = 0;
                }
                match self.ctx.messenger.pin(self.channel, message).await {
                    Ok(()) => {}
                    Err(MessengerError::Forbidden(_)) => {
                        let notice = Message::PinPermissionRequired.to_string();
                        let _ = self.ctx.messenger.post(self.channel, &notice).await;
                    }
                    Err(e) => tracing::debug!(channel = self.channel, error = %e, "pin failed"),
                }
            }
            Err(MessengerError::Forbidden(reason)) => {
                self.pin.lock().failures = FORBIDDEN_FAILURES;
                msg_warning!(Message::StatusUpdateFailed {
                    channel: self.channel,
                    error: reason,
                });
                for timer in timers {
                    timer.stop();
                }
                let notice = Message::StatusPostForbidden.to_string();
                let _ = self.ctx.messenger.post(self.channel, &notice).await;
            }
            Err(e) => {
                self.pin.lock().failures += 1;
                msg_error!(Message::StatusUpdateFailed {
                    channel: self.channel,
                    error: e.to_string(),
                });
            }
        }
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            channel: self.channel,
            pinned_message: self.pinned_message(),
            timers: self.timers().iter().map(|t| t.snapshot()).collect(),
        }
    }

    /// Restores the pinned message and every known timer; returns how many
    /// timers were restored. Unknown timers are skipped.
    pub fn restore_from(&self, snapshot: &ChannelSnapshot) -> usize {
        self.pin.lock().pinned = snapshot.pinned_message;

        let mut restored = 0;
        for timer_snapshot in &snapshot.timers {
            let Some(timer) = self.timer(timer_snapshot.id) else {
                continue;
            };
            match timer.restore_from(timer_snapshot) {
                Ok(()) => {
                    timer.resume();
                    restored += 1;
                }
                Err(e) => msg_warning!(Message::SnapshotTimerSkipped {
                    timer: timer_snapshot.id,
                    error: e.to_string(),
                }),
            }
        }
        restored
    }
}
