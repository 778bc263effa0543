use crate::{
    db::{
        db::Db,
        patterns::Patterns,
        timers::{TimerDefinition, Timers, DEFAULT_LABEL_FORMAT},
    },
    libs::{config::Config, messages::Message, pattern::PatternRegistry, view::View},
    msg_info, msg_success,
};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct TimerArgs {
    #[command(subcommand)]
    command: TimerCommand,
}

#[derive(Debug, Args)]
struct CreateArgs {
    /// Timer id, shared with the membership tag
    id: u64,
    #[arg(short, long)]
    group: u64,
    /// Channel receiving announcements and the status message
    #[arg(short, long)]
    channel: u64,
    #[arg(short, long)]
    name: String,
    /// Default pattern or preset name
    #[arg(short, long)]
    pattern: Option<String>,
    /// Label (voice channel) renamed with the timer status
    #[arg(long)]
    label: Option<u64>,
    #[arg(long, default_value = DEFAULT_LABEL_FORMAT)]
    label_format: String,
    /// Play an alert in the label channel at stage boundaries
    #[arg(long)]
    voice_alert: bool,
    /// Return to the default pattern when a stage ends with nobody subscribed
    #[arg(long)]
    auto_reset: bool,
    /// Leave the "please respond" line out of announcements
    #[arg(long)]
    compact: bool,
    /// Ignore members joining the label channel
    #[arg(long)]
    no_voice_join: bool,
    /// Ignore members leaving the label channel
    #[arg(long)]
    no_voice_leave: bool,
}

#[derive(Debug, Subcommand)]
enum TimerCommand {
    /// Create or replace a timer definition
    Create(CreateArgs),
    /// List timer definitions
    List {
        #[arg(short, long)]
        group: Option<u64>,
    },
    /// Remove a timer definition
    Remove { id: u64 },
    /// Show the pattern changes of a timer
    History { id: u64 },
}

pub fn cmd(args: TimerArgs) -> Result<()> {
    let db = Db::new()?;
    let timers = Timers::new(&db);

    match args.command {
        TimerCommand::Create(create) => {
            let default_pattern = match &create.pattern {
                Some(text) => {
                    let registry = PatternRegistry::new(&db, Config::read()?.engine().pattern_cache_size);
                    Some(registry.parse(text, None, Some(create.group))?.id.clone())
                }
                None => None,
            };
            let definition = TimerDefinition {
                default_pattern,
                label_target: create.label,
                voice_alert: create.voice_alert,
                auto_reset: create.auto_reset,
                compact: create.compact,
                label_format: create.label_format,
                track_voice_join: !create.no_voice_join,
                track_voice_leave: !create.no_voice_leave,
                ..TimerDefinition::new(create.id, create.group, create.channel, &create.name)
            };
            timers.upsert(&definition)?;
            msg_success!(Message::TimerSaved(definition.id));
        }
        TimerCommand::List { group } => {
            let list = match group {
                Some(group) => timers.fetch_group(group)?,
                None => timers.fetch_all()?,
            };
            if list.is_empty() {
                msg_info!(Message::NoTimers);
            } else {
                View::timers(&list)?;
            }
        }
        TimerCommand::Remove { id } => {
            if timers.delete(id)? {
                msg_success!(Message::TimerRemoved(id));
            } else {
                msg_info!(Message::TimerNotFound(id));
            }
        }
        TimerCommand::History { id } => {
            let changes = Patterns::new(&db).history(id)?;
            if changes.is_empty() {
                msg_info!(Message::NoPatternHistory(id));
            } else {
                View::pattern_history(&changes)?;
            }
        }
    }

    Ok(())
}
