//! Command-line interface for operating the engine.
//!
//! `run` starts the engine against the console messenger; the remaining
//! commands inspect and edit the stored data that the engine works from:
//! timer definitions, pattern presets, recorded sessions, member settings,
//! the runtime snapshot and the database schema.

pub mod init;
pub mod migrations;
pub mod notify;
pub mod pattern;
pub mod run;
pub mod sessions;
pub mod snapshot;
pub mod timer;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Configuration initialization")]
    Init(init::InitArgs),
    #[command(about = "Run the timer engine until interrupted")]
    Run(run::RunArgs),
    #[command(about = "Parse patterns and manage presets", arg_required_else_help = true)]
    Pattern(pattern::PatternArgs),
    #[command(about = "Manage timer definitions", arg_required_else_help = true)]
    Timer(timer::TimerArgs),
    #[command(about = "Show recorded sessions")]
    Sessions(sessions::SessionsArgs),
    #[command(about = "Set a member's notification level")]
    Notify(notify::NotifyArgs),
    #[command(about = "Show the saved runtime snapshot")]
    Snapshot(snapshot::SnapshotArgs),
    #[command(about = "Inspect and upgrade the engine schema", arg_required_else_help = true)]
    Migrations(migrations::MigrationsArgs),
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        match cli.command {
            Commands::Init(args) => init::cmd(args),
            Commands::Run(args) => run::cmd(args).await,
            Commands::Pattern(args) => pattern::cmd(args),
            Commands::Timer(args) => timer::cmd(args),
            Commands::Sessions(args) => sessions::cmd(args),
            Commands::Notify(args) => notify::cmd(args),
            Commands::Snapshot(args) => snapshot::cmd(args),
            Commands::Migrations(args) => migrations::cmd(args),
        }
    }
}
