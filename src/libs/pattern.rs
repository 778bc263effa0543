//! Stage patterns: parsing, display and the shared registry.
//!
//! A [`Pattern`] is an ordered, non-empty list of [`Stage`]s that a timer
//! repeats forever. Patterns are immutable and content addressed: the id is
//! the SHA-256 hex digest of the canonical stage encoding, so two timers
//! running `50/10` share the same pattern row and the same cached value.
//!
//! ## Grammar
//!
//! - short form, `25/5/25/5/25/15`: stages alternate between `Work` and
//!   `Break`. Without any `*`, work stages are focus stages; otherwise only
//!   the durations marked with `*` are.
//! - long form, `Study, 50*, Good luck!; Rest, 10`: `;` separated blocks of
//!   `name, duration` or `name, duration, message`, `*` marking focus.
//! - a bare name, looked up in the member's presets and then the group's
//!   (see [`PatternRegistry::parse`]).
//!
//! ```rust
//! use pomogroup::libs::pattern::Pattern;
//!
//! let pattern = Pattern::parse("25/5").unwrap();
//! assert_eq!(pattern.stages.len(), 2);
//! assert_eq!(pattern.display(None, None), "25/5");
//! ```

use crate::db::db::Db;
use crate::db::patterns::Patterns;
use crate::db::presets::{PresetScope, Presets};
use crate::libs::engine::{GroupId, MemberId};
use crate::libs::error::{EngineError, InvalidPattern};
use crate::libs::lfu::LfuCache;
use crate::libs::messages::Message;
use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::Arc;

const WORK_STAGE: &str = "Work";
const WORK_MESSAGE: &str = "Good luck!";
const BREAK_STAGE: &str = "Break";
const BREAK_MESSAGE: &str = "Have a rest!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    /// Length in minutes, always positive.
    pub duration: u32,
    pub message: String,
    /// Whether time in this stage counts as focused time.
    pub focus: bool,
}

impl Stage {
    pub fn new(name: &str, duration: u32, message: &str, focus: bool) -> Self {
        Self {
            name: name.to_string(),
            duration,
            message: message.to_string(),
            focus,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.duration as i64 * 60
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub id: String,
    pub stages: Vec<Stage>,
    /// Display preference recorded when the pattern was first created.
    pub short_repr: bool,
}

impl Pattern {
    pub fn new(stages: Vec<Stage>, short_repr: bool) -> Self {
        let id = Self::digest(&Self::encode(&stages));
        Self { id, stages, short_repr }
    }

    /// Canonical encoding: a JSON array of `[name, duration, message, focus]`.
    pub fn encode(stages: &[Stage]) -> String {
        let tuples: Vec<_> = stages
            .iter()
            .map(|s| (&s.name, s.duration, &s.message, s.focus))
            .collect();
        serde_json::to_string(&tuples).unwrap_or_default()
    }

    pub fn decode(stage_str: &str) -> Result<Vec<Stage>> {
        let tuples: Vec<(String, u32, String, bool)> = serde_json::from_str(stage_str)?;
        if tuples.is_empty() {
            return Err(anyhow!("pattern has no stages"));
        }
        Ok(tuples
            .into_iter()
            .map(|(name, duration, message, focus)| Stage {
                name,
                duration,
                message,
                focus,
            })
            .collect())
    }

    fn digest(encoded: &str) -> String {
        format!("{:x}", Sha256::digest(encoded.as_bytes()))
    }

    /// Parses the short or long form. Presets are not consulted here.
    pub fn parse(text: &str) -> Result<Pattern, InvalidPattern> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InvalidPattern::new(Message::NoPatternProvided));
        }

        if text.contains(';') || text.contains(',') {
            Ok(Pattern::new(Self::parse_long(text)?, false))
        } else if text.contains('/') {
            Ok(Pattern::new(Self::parse_short(text)?, true))
        } else {
            Err(InvalidPattern::new(Message::PatternSingleStage))
        }
    }

    fn parse_long(text: &str) -> Result<Vec<Stage>, InvalidPattern> {
        let mut stages = Vec::new();
        for block in text.trim_matches(';').split(';') {
            let parts: Vec<&str> = block.splitn(3, ',').collect();
            if parts.len() == 1 {
                return Err(InvalidPattern::new(Message::PatternBadBlock(block.to_string())));
            }

            let (duration, focus) = split_focus(parts[1]);
            let duration = parse_minutes(duration).ok_or_else(|| {
                InvalidPattern::new(Message::PatternBadDurationInBlock {
                    token: duration.to_string(),
                    block: block.trim().to_string(),
                })
            })?;
            let message = parts.get(2).map(|m| m.trim()).unwrap_or("");
            stages.push(Stage::new(parts[0].trim(), duration, message, focus));
        }
        Ok(stages)
    }

    fn parse_short(text: &str) -> Result<Vec<Stage>, InvalidPattern> {
        let default_focus = !text.contains('*');
        let mut stages = Vec::new();
        for (i, block) in text.trim_matches('/').split('/').enumerate() {
            let (duration, focus) = split_focus(block);
            let duration = parse_minutes(duration)
                .ok_or_else(|| InvalidPattern::new(Message::PatternBadDuration(duration.to_string())))?;

            let is_work = i % 2 == 0;
            let stage = if is_work {
                Stage::new(WORK_STAGE, duration, WORK_MESSAGE, default_focus || focus)
            } else {
                Stage::new(BREAK_STAGE, duration, BREAK_MESSAGE, !default_focus && focus)
            };
            stages.push(stage);
        }
        Ok(stages)
    }

    /// Renders the pattern.
    ///
    /// `brief` selects the `d1/d2/...` form (defaulting to the pattern's own
    /// preference); `truncate` caps how many stages the brief form shows.
    pub fn display(&self, brief: Option<bool>, truncate: Option<usize>) -> String {
        if brief.unwrap_or(self.short_repr) {
            match truncate {
                Some(limit) if self.stages.len() > limit => {
                    let shown: Vec<String> = self.stages[..limit].iter().map(|s| s.duration.to_string()).collect();
                    format!("{}/...", shown.join("/"))
                }
                _ => self
                    .stages
                    .iter()
                    .map(|s| s.duration.to_string())
                    .collect::<Vec<_>>()
                    .join("/"),
            }
        } else {
            self.stages
                .iter()
                .map(|s| format!("{}, {}{}, {}", s.name, s.duration, if s.focus { "*" } else { "" }, s.message))
                .collect::<Vec<_>>()
                .join(";\n")
        }
    }
}

/// Strips focus markers, returning the bare duration token.
fn split_focus(token: &str) -> (&str, bool) {
    let token = token.trim();
    let focus = token.starts_with('*') || token.ends_with('*');
    if focus {
        (token.trim_matches(|c| c == '*' || c == ' '), true)
    } else {
        (token, false)
    }
}

fn parse_minutes(token: &str) -> Option<u32> {
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    token.parse::<u32>().ok().filter(|minutes| *minutes > 0)
}

/// Interns patterns and resolves pattern text for the engine.
///
/// Live patterns are kept in an LFU cache in front of the `patterns` table.
pub struct PatternRegistry {
    cache: Mutex<LfuCache<String, Arc<Pattern>>>,
    table: Patterns,
    presets: Presets,
}

impl PatternRegistry {
    pub fn new(db: &Db, capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LfuCache::new(capacity)),
            table: Patterns::new(db),
            presets: Presets::new(db),
        }
    }

    /// Loads a pattern by digest, from the cache or from storage.
    pub fn get(&self, id: &str) -> Result<Arc<Pattern>> {
        if let Some(pattern) = self.cache.lock().get(&id.to_string()) {
            return Ok(pattern);
        }
        let row = self
            .table
            .fetch(id)?
            .ok_or_else(|| anyhow!(Message::PatternLoadFailed(id.to_string()).to_string()))?;
        let pattern = Arc::new(Pattern {
            id: row.id,
            stages: Pattern::decode(&row.stage_str)?,
            short_repr: row.short_repr,
        });
        self.cache.lock().insert(pattern.id.clone(), Arc::clone(&pattern));
        Ok(pattern)
    }

    /// Caches every pattern currently set up on some timer.
    pub fn preload(&self) -> Result<usize> {
        let rows = self.table.fetch_current()?;
        let mut cache = self.cache.lock();
        for row in &rows {
            let pattern = Pattern {
                id: row.id.clone(),
                stages: Pattern::decode(&row.stage_str)?,
                short_repr: row.short_repr,
            };
            cache.insert(pattern.id.clone(), Arc::new(pattern));
        }
        Ok(rows.len())
    }

    /// Returns the shared instance of `pattern`, storing it on first use.
    pub fn intern(&self, pattern: Pattern) -> Result<Arc<Pattern>> {
        if let Some(existing) = self.cache.lock().get(&pattern.id) {
            return Ok(existing);
        }
        let row = self
            .table
            .fetch_or_create(&pattern.id, pattern.short_repr, &Pattern::encode(&pattern.stages))?;
        let pattern = Arc::new(Pattern {
            short_repr: row.short_repr,
            ..pattern
        });
        self.cache.lock().insert(pattern.id.clone(), Arc::clone(&pattern));
        Ok(pattern)
    }

    /// Resolves user text into a pattern.
    ///
    /// The text is first tried as a preset name of `member`, then of `group`,
    /// and finally parsed as a pattern.
    pub fn parse(&self, text: &str, member: Option<MemberId>, group: Option<GroupId>) -> Result<Arc<Pattern>, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InvalidPattern::new(Message::NoPatternProvided).into());
        }
        if let Some(pattern) = self.preset(text, member, group)? {
            return Ok(pattern);
        }
        let pattern = Pattern::parse(text)?;
        Ok(self.intern(pattern)?)
    }

    /// The pattern saved under `name`, member presets taking precedence.
    pub fn preset(&self, name: &str, member: Option<MemberId>, group: Option<GroupId>) -> Result<Option<Arc<Pattern>>> {
        let scopes = member
            .map(PresetScope::Member)
            .into_iter()
            .chain(group.map(PresetScope::Group));
        for scope in scopes {
            if let Some(pattern_id) = self.presets.fetch(scope, name)? {
                return Ok(Some(self.get(&pattern_id)?));
            }
        }
        Ok(None)
    }

    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }
}
