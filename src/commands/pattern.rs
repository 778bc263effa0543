use crate::{
    db::{
        db::Db,
        presets::{PresetScope, Presets},
    },
    libs::{config::Config, messages::Message, pattern::PatternRegistry, view::View},
    msg_bail_anyhow, msg_info, msg_print, msg_success,
};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct PatternArgs {
    #[command(subcommand)]
    command: PatternCommand,
}

#[derive(Debug, Args)]
struct ScopeArgs {
    /// Member owning the preset
    #[arg(short, long)]
    member: Option<u64>,
    /// Group owning the preset
    #[arg(short, long)]
    group: Option<u64>,
}

impl ScopeArgs {
    fn scope(&self) -> Result<PresetScope> {
        match (self.member, self.group) {
            (Some(member), _) => Ok(PresetScope::Member(member)),
            (None, Some(group)) => Ok(PresetScope::Group(group)),
            (None, None) => msg_bail_anyhow!(Message::PresetScopeRequired),
        }
    }
}

#[derive(Debug, Subcommand)]
enum PatternCommand {
    /// Parse a pattern (or resolve a preset) and print its stages
    Show {
        /// Pattern text such as "25/5/25/15" or a preset name
        pattern: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Save a pattern under a preset name
    Save {
        name: String,
        pattern: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Delete a preset
    Delete {
        name: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// List the presets of a member or group
    List {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

pub fn cmd(args: PatternArgs) -> Result<()> {
    let db = Db::new()?;
    let registry = PatternRegistry::new(&db, Config::read()?.engine().pattern_cache_size);
    let presets = Presets::new(&db);

    match args.command {
        PatternCommand::Show { pattern, scope } => {
            let pattern = registry.parse(&pattern, scope.member, scope.group)?;
            msg_print!(pattern.display(None, None));
            msg_print!(Message::PatternIdentity(pattern.id.clone()));
        }
        PatternCommand::Save { name, pattern, scope } => {
            let owner = scope.scope()?;
            let pattern = registry.parse(&pattern, scope.member, scope.group)?;
            presets.save(owner, &name, &pattern.id)?;
            msg_success!(Message::PresetSaved(name));
        }
        PatternCommand::Delete { name, scope } => {
            if presets.delete(scope.scope()?, &name)? {
                msg_success!(Message::PresetDeleted(name));
            } else {
                msg_info!(Message::PresetNotFound(name));
            }
        }
        PatternCommand::List { scope } => {
            let list = presets.list(scope.scope()?)?;
            if list.is_empty() {
                msg_info!(Message::NoPresets);
            } else {
                View::presets(&list)?;
            }
        }
    }

    Ok(())
}
