use crate::{
    db::{db::Db, members::Members},
    libs::{messages::Message, subscriber::NotifyLevel},
    msg_print, msg_success,
};
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct NotifyArgs {
    member: u64,
    /// New level; prints the current one when omitted
    #[arg(value_enum)]
    level: Option<NotifyLevel>,
}

pub fn cmd(args: NotifyArgs) -> Result<()> {
    let members = Members::new(&Db::new()?);

    match args.level {
        Some(level) => {
            members.set_notify_level(args.member, level)?;
            msg_success!(Message::NotifyLevelSet {
                member: args.member,
                level: level.as_str().to_string(),
            });
        }
        None => {
            let name = members.name(args.member)?.unwrap_or_else(|| args.member.to_string());
            msg_print!(Message::NotifyLevelCurrent {
                member: name,
                level: members.notify_level(args.member)?.as_str().to_string(),
            });
        }
    }

    Ok(())
}
