use crate::{
    db::{
        db::Db,
        migrations::{get_db_version, MigrationManager},
    },
    libs::{messages::Message, view::View},
    msg_info, msg_print,
};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct MigrationsArgs {
    #[command(subcommand)]
    command: MigrationsCommand,
}

#[derive(Debug, Subcommand)]
enum MigrationsCommand {
    /// Compare the stored engine schema with the one this build expects
    Status,
    /// Apply pending schema changes without starting the engine
    Upgrade,
    /// Table of applied schema changes
    History,
}

pub fn cmd(args: MigrationsArgs) -> Result<()> {
    let mut conn = Db::new_without_migrations()?;
    let manager = MigrationManager::new();

    match args.command {
        MigrationsCommand::Status => {
            let current = get_db_version(&conn)?;
            let latest = manager.latest_version();
            msg_print!(Message::SchemaVersion { current, latest });
            if current < latest {
                msg_info!(Message::MigrationsFound((latest - current) as usize));
            } else {
                msg_info!(Message::DatabaseUpToDate);
            }
        }
        MigrationsCommand::Upgrade => manager.run_migrations(&mut conn)?,
        MigrationsCommand::History => {
            let history = manager.get_migration_history(&conn)?;
            if history.is_empty() {
                msg_info!(Message::NoMigrationsApplied);
            } else {
                View::migrations(&history)?;
            }
        }
    }

    Ok(())
}
