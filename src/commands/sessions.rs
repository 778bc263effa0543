use crate::{
    db::{db::Db, sessions::Sessions},
    libs::{formatter::format_seconds, messages::Message, view::View},
    msg_info, msg_print,
};
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct SessionsArgs {
    /// Only sessions of this member
    #[arg(short, long)]
    member: Option<u64>,
    /// Only sessions in this group
    #[arg(short, long)]
    group: Option<u64>,
    /// Show at most this many sessions, newest first
    #[arg(short, long, default_value_t = 20)]
    limit: usize,
}

pub fn cmd(args: SessionsArgs) -> Result<()> {
    let sessions = Sessions::new(&Db::new()?).fetch(args.member, args.group, args.limit)?;
    if sessions.is_empty() {
        msg_info!(Message::NoSessions);
        return Ok(());
    }

    View::sessions(&sessions)?;

    let duration: i64 = sessions.iter().map(|s| s.duration).sum();
    let focused: i64 = sessions.iter().map(|s| s.focused_duration).sum();
    msg_print!(Message::SessionsTotal {
        count: sessions.len(),
        duration: format_seconds(duration, false),
        focused: format_seconds(focused, false),
    });
    Ok(())
}
