use crate::db::patterns::PatternChange;
use crate::db::presets::Preset;
use crate::db::sessions::SessionRecord;
use crate::db::timers::TimerDefinition;
use crate::libs::formatter::{format_seconds, format_timestamp};
use crate::libs::snapshot::Snapshot;
use anyhow::Result;
use prettytable::{row, Table};

pub struct View {}

impl View {
    pub fn timers(timers: &[TimerDefinition]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["ID", "GROUP", "CHANNEL", "NAME", "LABEL", "FLAGS"]);
        for timer in timers {
            let mut flags = Vec::new();
            if timer.voice_alert {
                flags.push("alert");
            }
            if timer.auto_reset {
                flags.push("reset");
            }
            if timer.compact {
                flags.push("compact");
            }
            table.add_row(row![
                timer.id,
                timer.group,
                timer.channel,
                timer.name,
                timer.label_target.map(|l| l.to_string()).unwrap_or_default(),
                flags.join(",")
            ]);
        }
        table.printstd();

        Ok(())
    }

    pub fn sessions(sessions: &[SessionRecord]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["MEMBER", "GROUP", "TIMER", "STARTED", "DURATION", "FOCUSED", "PATTERN"]);
        for session in sessions {
            table.add_row(row![
                session.member,
                session.group,
                session.timer,
                format_timestamp(session.start_time),
                format_seconds(session.duration, true),
                format_seconds(session.focused_duration, true),
                short_id(&session.pattern_id)
            ]);
        }
        table.printstd();

        Ok(())
    }

    pub fn presets(presets: &[Preset]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["NAME", "PATTERN"]);
        for preset in presets {
            table.add_row(row![preset.name, short_id(&preset.pattern_id)]);
        }
        table.printstd();

        Ok(())
    }

    pub fn pattern_history(changes: &[PatternChange]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["CHANGED", "PATTERN", "BY"]);
        for change in changes {
            table.add_row(row![
                format_timestamp(change.modified_at),
                short_id(&change.pattern_id),
                change.modified_by.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string())
            ]);
        }
        table.printstd();

        Ok(())
    }

    pub fn migrations(history: &[(u32, String, String)]) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["VERSION", "NAME", "APPLIED"]);
        for (version, name, applied_at) in history {
            table.add_row(row![format!("v{}", version), name, applied_at]);
        }
        table.printstd();

        Ok(())
    }

    pub fn snapshot(snapshot: &Snapshot) -> Result<()> {
        let mut table = Table::new();

        table.add_row(row!["GROUP", "CHANNEL", "TIMER", "STATE", "STAGE", "SINCE", "SUBSCRIBERS"]);
        for (group, channels) in snapshot {
            for channel in channels {
                for timer in &channel.timers {
                    let names = timer.subscribers.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
                    table.add_row(row![
                        group,
                        channel.channel,
                        timer.id,
                        format!("{:?}", timer.state),
                        timer.stage_index,
                        format_timestamp(timer.stage_start),
                        names.join(", ")
                    ]);
                }
            }
        }
        table.printstd();

        Ok(())
    }
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
