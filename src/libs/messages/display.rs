//! Display implementation for pomogroup messages.
//!
//! All user-facing text lives here: the announcements a running timer posts
//! into its channel, the direct notifications sent to members, the lines of
//! the pinned status message, and the console output of the CLI. Keeping the
//! text in one match makes every wording change a one-line edit and lets the
//! compiler check that each variant is rendered.
//!
//! Chat text uses the platform's lightweight markup (`**bold**`, `*italic*`)
//! and mention syntax (`<@member>`, `<@&tag>`, `<#channel>`), produced by the
//! helpers in [`crate::libs::formatter`].

use super::types::Message;
use crate::libs::formatter::{mention_channel, mention_member, mention_tag};
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let text = match self {
            // === STAGE ANNOUNCEMENTS ===
            Message::StageFinished(name) => format!("**{}** finished! ", name),
            Message::StageStarting { name, duration, message } => {
                format!("Starting **{}** ({} minutes). {}", name, duration, message)
            }
            Message::PleaseRespond => "Please respond or react to this message to avoid being unsubscribed.".to_string(),
            Message::InactivityWarning(mentions) => format!(
                "{} you will be unsubscribed on the next stage if you do not respond or react to this message.",
                mentions
            ),
            Message::InactivityRemoved(mentions) => format!("{} you have been unsubscribed due to inactivity!", mentions),

            // === DIRECT NOTIFICATIONS ===
            Message::DirectRemoved { timer, channel, clocked } => format!(
                "You have been unsubscribed from the group **{}** in {} due to inactivity!\nYou were subscribed for **{}**.",
                timer,
                mention_channel(*channel),
                clocked
            ),
            Message::DirectWarning { timer, channel, main_line } => format!(
                "**Warning** from group **{}** in {}!\nPlease respond or react to a timer message to avoid being unsubscribed on the next stage.\n{}",
                timer,
                mention_channel(*channel),
                main_line
            ),
            Message::DirectStatus { timer, channel, main_line } => {
                format!("Status update for group **{}** in {}!\n{}", timer, mention_channel(*channel), main_line)
            }

            // === SUBSCRIPTION MESSAGES ===
            Message::Welcome { timer, member } => format!("Welcome to **{}**, {}!", timer, mention_member(*member)),
            Message::WelcomeRunning { stage, remaining, message } => {
                format!("Currently on stage **{}** with **{}** remaining. {}", stage, remaining, message)
            }
            Message::WelcomeStopped => "The group timer is not running. Start it to begin a new session.".to_string(),
            Message::Goodbye { member, clocked } => {
                format!("Goodbye {}! You were subscribed for **{}**.", mention_member(*member), clocked)
            }
            Message::GrantForbidden { member, timer } => format!(
                "I don't have enough permissions to subscribe {} to {}!",
                mention_member(*member),
                mention_tag(*timer)
            ),

            // === STATUS RENDERING ===
            Message::StatusTitle => "Pomodoro Timer Status".to_string(),
            Message::StatusPostForbidden => "I require permission to post the status message in this channel! Timers stopped.".to_string(),
            Message::PinPermissionRequired => {
                "I don't have the permission required to pin the channel status message! Please pin the message manually.".to_string()
            }
            Message::TimerNotRunning => "*Timer not running.*".to_string(),
            Message::TimerNotSetUp => "*Timer not set up.*".to_string(),
            Message::TimerPausedMark => "***Paused***".to_string(),
            Message::NoMembers => "*No members*".to_string(),
            Message::SummaryRunning => "Running".to_string(),
            Message::SummaryPaused => "Paused".to_string(),
            Message::SummaryStopped => "Stopped".to_string(),
            Message::OnelineSummary {
                name,
                status,
                members,
                pattern,
            } => format!("{}  ({} with {} members, {}.)", name, status, members, pattern),

            // === PATTERN MESSAGES ===
            Message::NoPatternProvided => "No pattern provided!".to_string(),
            Message::PatternSingleStage => "Patterns must have more than one stage!".to_string(),
            Message::PatternBadBlock(block) => {
                format!("`{}` is not of the form `name, length` or `name, length, message`.", block)
            }
            Message::PatternBadDuration(token) => format!("`{}` couldn't be parsed as a duration.", token),
            Message::PatternBadDurationInBlock { token, block } => {
                format!("`{}` in `{}` couldn't be parsed as a duration.", token, block)
            }
            Message::PresetUnknown(name) => format!("No preset named `{}` exists.", name),
            Message::PatternLoadFailed(id) => format!("Stored pattern {} could not be loaded", id),

            // === ENGINE ERRORS ===
            Message::TimerIsNotRunning => "The group timer is not running!".to_string(),
            Message::TimerIsNotSetUp => "The group timer has not been set up!".to_string(),
            Message::InvalidSkipCount { count, max } => {
                format!("Cannot skip {} stages, the number of stages to skip must be between 1 and {}.", count, max)
            }
            Message::MemberNotSubscribed(member) => format!("{} is not subscribed to this group!", mention_member(*member)),
            Message::UnknownTimer(id) => format!("No group timer with id {} is loaded.", id),

            // === ENGINE LOG MESSAGES ===
            Message::EngineStarting => "Starting the group timer engine".to_string(),
            Message::EngineStopped => "Group timer engine stopped".to_string(),
            Message::TimersLoaded(count) => format!("Loaded {} group timers", count),
            Message::TimerCreated { id, name } => format!("Created group timer {} ({})", name, id),
            Message::TimerDestroyed(id) => format!("Destroyed group timer {}", id),
            Message::TimerMoved { id, channel } => format!("Moved group timer {} to channel {}", id, channel),
            Message::TimersStarted(count) => format!("Started {} group timers", count),
            Message::StageChangeFailed { timer, error } => format!("Stage change failed for timer {}: {}", timer, error),
            Message::StatusUpdateFailed { channel, error } => {
                format!("Status message update failed for channel {}: {}", channel, error)
            }
            Message::SessionSaveFailed(error) => format!("Failed to save session record: {}", error),
            Message::HistorySaveFailed(error) => format!("Failed to record pattern change: {}", error),
            Message::SnapshotWritten(path) => format!("Timer snapshot written to {}", path),
            Message::SnapshotWriteFailed(error) => format!("Failed to write timer snapshot: {}", error),
            Message::SnapshotRestored(count) => format!("Restored {} group timers from snapshot", count),
            Message::SnapshotCorrupt(path) => format!("Timer snapshot is unreadable, moved aside to {}", path),
            Message::SnapshotTimerSkipped { timer, error } => format!("Skipped restoring timer {}: {}", timer, error),

            // === CONSOLE MESSENGER ===
            Message::ConsolePost { channel, message, text } => format!("[#{} msg {}]\n{}", channel, message, text),
            Message::ConsoleEdit { channel, message, text } => format!("[#{} edit {}]\n{}", channel, message, text),
            Message::ConsolePin { channel, message } => format!("[#{} pinned {}]", channel, message),
            Message::ConsoleMarkers { message, markers } => format!("[msg {} markers {}]", message, markers),
            Message::ConsoleDirect { member, text } => format!("[dm {}]\n{}", member, text),
            Message::ConsoleRename { label, name } => format!("[label {} renamed] {}", label, name),
            Message::ConsoleGrant { member, tag } => format!("[tag {} granted to {}]", tag, member),
            Message::ConsoleRevoke { member, tag } => format!("[tag {} revoked from {}]", tag, member),
            Message::ConsoleAlert(label) => format!("[label {} alert]", label),

            // === CONFIG MESSAGES ===
            Message::ConfigSaved => "Configuration saved successfully".to_string(),
            Message::ConfigModuleEngine => "Timer engine settings".to_string(),
            Message::PromptSelectModules => "Select the modules to configure".to_string(),
            Message::PromptMaxWarnings => "Inactivity warnings before removal".to_string(),
            Message::PromptDefaultPattern => "Default timer pattern".to_string(),
            Message::PromptMinSessionDuration => "Minimum recorded session length (seconds)".to_string(),
            Message::PromptStatusBudget => "Status refresh cycle (seconds)".to_string(),
            Message::PromptSaveInterval => "Snapshot interval (seconds)".to_string(),
            Message::PromptPinFailureThreshold => "Status failures before pausing refreshes".to_string(),

            // === MIGRATION MESSAGES ===
            Message::MigrationsFound(count) => format!("Found {} pending database migrations", count),
            Message::RunningMigration(version, name) => format!("Running migration v{}: {}", version, name),
            Message::MigrationCompleted(version) => format!("✓ Migration v{} completed", version),
            Message::MigrationFailed(version, error) => format!("✗ Migration v{} failed: {}", version, error),
            Message::AllMigrationsCompleted => "All database migrations completed successfully".to_string(),
            Message::SchemaVersion { current, latest } => {
                format!("Engine schema at v{} (latest v{})", current, latest)
            }
            Message::DatabaseUpToDate => "Database schema is up to date".to_string(),
            Message::NoMigrationsApplied => "No migrations applied yet".to_string(),

            // === SIGNAL MESSAGES ===
            Message::ReceivedSigterm => "Received SIGTERM, shutting down".to_string(),
            Message::ReceivedSigint => "Received SIGINT, shutting down".to_string(),
            Message::ReceivedCtrlC => "Received Ctrl+C, shutting down".to_string(),
            Message::CtrlCListenFailed(error) => format!("Failed to listen for Ctrl+C: {}", error),
            Message::SignalHandlerFailed(error) => format!("Failed to install signal handler: {}", error),
            Message::SignalHandlingNotSupported => "Signal handling is not supported on this platform".to_string(),

            // === CLI MESSAGES ===
            Message::PatternIdentity(id) => format!("Pattern id: {}", id),
            Message::PresetScopeRequired => "Either --member or --group must be given".to_string(),
            Message::PresetSaved(name) => format!("Preset '{}' saved", name),
            Message::PresetDeleted(name) => format!("Preset '{}' deleted", name),
            Message::PresetNotFound(name) => format!("Preset '{}' not found", name),
            Message::NoPresets => "No presets saved".to_string(),
            Message::NoTimers => "No group timers defined".to_string(),
            Message::TimerSaved(id) => format!("Group timer {} saved", id),
            Message::TimerRemoved(id) => format!("Group timer {} removed", id),
            Message::TimerNotFound(id) => format!("Group timer {} not found", id),
            Message::NoPatternHistory(id) => format!("No pattern changes recorded for timer {}", id),
            Message::NoSessions => "No sessions recorded".to_string(),
            Message::SessionsTotal { count, duration, focused } => {
                format!("{} sessions, {} total, {} focused", count, duration, focused)
            }
            Message::SnapshotMissing(path) => format!("No snapshot found at {}", path),
            Message::NotifyLevelSet { member, level } => format!("Notification level for {} set to {}", member, level),
            Message::NotifyLevelCurrent { member, level } => format!("Notification level for {}: {}", member, level),
        };

        write!(f, "{}", text)
    }
}
