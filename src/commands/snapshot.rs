use crate::{
    libs::{messages::Message, snapshot::SnapshotStore, view::View},
    msg_info,
};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Snapshot file; defaults to the one in the data directory
    #[arg(short, long)]
    path: Option<PathBuf>,
}

pub fn cmd(args: SnapshotArgs) -> Result<()> {
    let store = match args.path {
        Some(path) => SnapshotStore::new(path),
        None => SnapshotStore::in_data_dir()?,
    };

    match store.read()? {
        Some(snapshot) => View::snapshot(&snapshot)?,
        None => msg_info!(Message::SnapshotMissing(store.path().display().to_string())),
    }
    Ok(())
}
