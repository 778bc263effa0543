#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pomogroup::db::db::Db;
use pomogroup::libs::clock::Clock;
use pomogroup::libs::config::EngineConfig;
use pomogroup::libs::engine::{ChannelId, EngineContext, GroupId, LabelId, MemberId, MessageId, TimerId};
use pomogroup::libs::messenger::{Messenger, MessengerError, MessengerResult};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// An hour boundary, so aligning shifts are easy to reason about.
pub const T0: i64 = 1_699_999_200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Post { channel: ChannelId, message: MessageId, text: String },
    Edit { channel: ChannelId, message: MessageId, text: String },
    Pin { channel: ChannelId, message: MessageId },
    Markers { message: MessageId, markers: Vec<String> },
    Direct { member: MemberId, text: String },
    Rename { label: LabelId, name: String },
    Grant { member: MemberId, tag: TimerId },
    Revoke { member: MemberId, tag: TimerId },
    Alert(LabelId),
}

/// Records every successful call; operations can be set to fail by name.
#[derive(Debug, Default)]
pub struct FakeMessenger {
    next_id: AtomicU64,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, MessengerError>>,
    yields: Mutex<HashSet<&'static str>>,
    held: Mutex<HashSet<&'static str>>,
    released: Notify,
}

impl FakeMessenger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1000),
            ..Default::default()
        })
    }

    pub fn fail(&self, operation: &'static str, error: MessengerError) {
        self.failures.lock().insert(operation, error);
    }

    /// Makes `operation` yield to the scheduler once before answering.
    pub fn yield_on(&self, operation: &'static str) {
        self.yields.lock().insert(operation);
    }

    /// Parks every call of `operation` until [`FakeMessenger::release`].
    pub fn hold(&self, operation: &'static str) {
        self.held.lock().insert(operation);
    }

    pub fn release(&self, operation: &'static str) {
        self.held.lock().remove(operation);
        self.released.notify_waiters();
    }

    pub fn heal(&self, operation: &'static str) {
        self.failures.lock().remove(operation);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn posts(&self) -> Vec<(MessageId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Post { message, text, .. } => Some((message, text)),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn directs(&self, member: MemberId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Direct { member: to, text } if to == member => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn renames(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Rename { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| wanted(call)).count()
    }

    async fn gate(&self, operation: &'static str) -> MessengerResult<()> {
        let yields = self.yields.lock().contains(operation);
        if yields {
            tokio::task::yield_now().await;
        }
        loop {
            let released = self.released.notified();
            if !self.held.lock().contains(operation) {
                break;
            }
            released.await;
        }
        self.check(operation)
    }

    fn check(&self, operation: &'static str) -> MessengerResult<()> {
        match self.failures.lock().get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Messenger for FakeMessenger {
    async fn post(&self, channel: ChannelId, text: &str) -> MessengerResult<MessageId> {
        self.gate("post").await?;
        let message = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(Call::Post {
            channel,
            message,
            text: text.to_string(),
        });
        Ok(message)
    }

    async fn edit(&self, channel: ChannelId, message: MessageId, text: &str) -> MessengerResult<()> {
        self.gate("edit").await?;
        self.record(Call::Edit {
            channel,
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn pin(&self, channel: ChannelId, message: MessageId) -> MessengerResult<()> {
        self.gate("pin").await?;
        self.record(Call::Pin { channel, message });
        Ok(())
    }

    async fn add_markers(&self, _channel: ChannelId, message: MessageId, markers: &[&str]) -> MessengerResult<()> {
        self.gate("markers").await?;
        self.record(Call::Markers {
            message,
            markers: markers.iter().map(|m| m.to_string()).collect(),
        });
        Ok(())
    }

    async fn direct_message(&self, member: MemberId, text: &str) -> MessengerResult<()> {
        self.gate("direct").await?;
        self.record(Call::Direct {
            member,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn rename(&self, label: LabelId, name: &str) -> MessengerResult<()> {
        self.gate("rename").await?;
        self.record(Call::Rename {
            label,
            name: name.to_string(),
        });
        Ok(())
    }

    async fn grant(&self, _group: GroupId, member: MemberId, tag: TimerId) -> MessengerResult<()> {
        self.gate("grant").await?;
        self.record(Call::Grant { member, tag });
        Ok(())
    }

    async fn revoke(&self, _group: GroupId, member: MemberId, tag: TimerId) -> MessengerResult<()> {
        self.gate("revoke").await?;
        self.record(Call::Revoke { member, tag });
        Ok(())
    }

    async fn play_alert(&self, label: LabelId) -> MessengerResult<()> {
        self.gate("alert").await?;
        self.record(Call::Alert(label));
        Ok(())
    }
}

/// Unix seconds that follow tokio's (pausable) clock.
#[derive(Debug)]
pub struct TokioClock {
    base: i64,
    origin: tokio::time::Instant,
}

impl TokioClock {
    /// Must be created inside a runtime.
    pub fn new(base: i64) -> Arc<Self> {
        Arc::new(Self {
            base,
            origin: tokio::time::Instant::now(),
        })
    }
}

impl Clock for TokioClock {
    fn now(&self) -> i64 {
        self.base + self.origin.elapsed().as_secs() as i64
    }
}

pub fn context(messenger: Arc<FakeMessenger>, clock: Arc<dyn Clock>, config: EngineConfig) -> EngineContext {
    EngineContext::new(messenger, clock, Db::in_memory().unwrap(), config)
}

/// Sleeps on tokio's clock, letting paused time run forward.
pub async fn advance(seconds: u64) {
    tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
}
