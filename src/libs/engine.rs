//! Shared identifiers and the engine context.
//!
//! Every component of the timer engine (timers, channel aggregators, the
//! orchestrator) receives an [`EngineContext`] at construction time instead of
//! reaching for globals. The context bundles the outward-facing messenger,
//! the clock, the database handle, the engine settings and the pattern
//! registry. Cloning it is cheap: everything is reference counted.

use crate::db::db::Db;
use crate::libs::clock::Clock;
use crate::libs::config::EngineConfig;
use crate::libs::messenger::Messenger;
use crate::libs::pattern::PatternRegistry;
use std::sync::Arc;

pub type GroupId = u64;
pub type ChannelId = u64;
pub type MemberId = u64;
/// Timer id; also the id of the membership tag granted to subscribers.
pub type TimerId = u64;
pub type MessageId = u64;
/// Id of the label target (a voice channel) renamed with timer status.
pub type LabelId = u64;

#[derive(Clone)]
pub struct EngineContext {
    pub messenger: Arc<dyn Messenger>,
    pub clock: Arc<dyn Clock>,
    pub db: Db,
    pub config: EngineConfig,
    pub patterns: Arc<PatternRegistry>,
}

impl EngineContext {
    pub fn new(messenger: Arc<dyn Messenger>, clock: Arc<dyn Clock>, db: Db, config: EngineConfig) -> Self {
        let patterns = Arc::new(PatternRegistry::new(&db, config.pattern_cache_size));
        Self {
            messenger,
            clock,
            db,
            config,
            patterns,
        }
    }

    /// Current time in unix seconds.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }
}
