//! Runs the engine in the foreground.
//!
//! Loads every stored timer, overlays the saved snapshot, launches the
//! status and persistence loops, and waits for SIGTERM/SIGINT (Ctrl+C on
//! Windows). On the way out all loops are stopped and a final snapshot is
//! written with the `shutdown` reason.
//!
//! Chat traffic goes through the console messenger, which prints every
//! post, edit and direct message to the terminal.

use crate::{
    db::db::Db,
    libs::{
        clock::SystemClock, config::Config, engine::EngineContext, messages::Message,
        messenger::ConsoleMessenger, orchestrator::Orchestrator, snapshot::SnapshotStore,
    },
    msg_error, msg_info, msg_print,
};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Snapshot file; defaults to the one in the data directory
    #[arg(short, long)]
    snapshot: Option<PathBuf>,
    /// Start every timer that is not already running
    #[arg(long)]
    start_all: bool,
}

pub async fn cmd(args: RunArgs) -> Result<()> {
    msg_info!(Message::EngineStarting);

    let config = Config::read()?.engine();
    let ctx = EngineContext::new(Arc::new(ConsoleMessenger::new()), Arc::new(SystemClock), Db::new()?, config);
    let store = match args.snapshot {
        Some(path) => SnapshotStore::new(path),
        None => SnapshotStore::in_data_dir()?,
    };

    let orchestrator = Orchestrator::new(ctx, store);
    orchestrator.load_timers()?;
    orchestrator.restore()?;
    if args.start_all {
        orchestrator.start_all().await;
    }
    for timer in orchestrator.timers() {
        msg_print!(timer.oneline_summary());
    }
    orchestrator.launch();

    wait_for_shutdown().await;
    orchestrator.shutdown()
}

async fn wait_for_shutdown() {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                (Err(e), _) | (_, Err(e)) => {
                    msg_error!(Message::SignalHandlerFailed(e.to_string()));
                    let _ = shutdown_tx.send(());
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => msg_info!(Message::ReceivedSigterm),
                _ = sigint.recv() => msg_info!(Message::ReceivedSigint),
            }

            let _ = shutdown_tx.send(());
        });
    }

    #[cfg(windows)]
    {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => msg_info!(Message::ReceivedCtrlC),
                Err(e) => msg_error!(Message::CtrlCListenFailed(e.to_string())),
            }

            let _ = shutdown_tx.send(());
        });
    }

    #[cfg(not(any(unix, windows)))]
    {
        crate::msg_warning!(Message::SignalHandlingNotSupported);
        drop(shutdown_tx);
        std::future::pending::<()>().await;
    }

    let _ = shutdown_rx.await;
}
