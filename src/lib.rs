//! InputScope - mouse and keyboard statistics.
//!
//! Captures raw input events, normalizes key names across platforms,
//! coalesces mouse moves and scrolls, tracks display geometry over time and
//! writes aggregate-friendly records to SQLite.

pub mod capture;
pub mod config;
pub mod display;
pub mod keyboard;
pub mod listener;
pub mod processing;
pub mod storage;

use anyhow::Context;
use clap::Parser;
use crate::capture::{SystemExeLookup, SystemForeground};
use crate::config::ListenerConfig;
use crate::listener::{Command, Listener};
use crate::storage::SqliteStore;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the stdin command host
#[derive(Parser, Debug)]
#[command(name = "inputscope")]
#[command(version, about = "Mouse and keyboard input listener", long_about = None)]
pub struct Args {
    /// SQLite database path
    #[arg(default_value = "inputscope.db")]
    pub db: PathBuf,

    /// Do not print counter snapshots and command outcomes
    #[arg(short, long)]
    pub quiet: bool,
}

/// Run the listener, reading commands from stdin until `exit`, EOF or Ctrl-C
pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr, stdout carries snapshots
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inputscope_lib=debug,inputscope=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting InputScope v{}", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(serve(args))
}

async fn serve(args: Args) -> anyhow::Result<()> {
    let store = SqliteStore::open(&args.db)
        .with_context(|| format!("Failed to open database {}", args.db.display()))?;

    let quiet = args.quiet;
    let builder = Listener::builder(ListenerConfig::default()).on_counts(move |snapshot| {
        if quiet {
            return;
        }
        match serde_json::to_string(snapshot) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Failed to serialize counters: {}", e),
        }
    });

    #[cfg(feature = "os-hooks")]
    let builder = {
        let (mouse, keyboard) = crate::capture::RdevHook::pair();
        builder.hook(Box::new(mouse)).hook(Box::new(keyboard))
    };

    let builder = if SystemForeground::is_supported() {
        builder.programs(SystemForeground::new(), SystemExeLookup::new())
    } else {
        tracing::info!("No foreground window source, events are not attributed to programs");
        builder
    };

    let listener = builder.spawn(store)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    tracing::info!("Stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let command: Command = match line.parse() {
                    Ok(command) => command,
                    Err(e) => {
                        tracing::warn!("Ignoring {:?}: {}", line.trim(), e);
                        continue;
                    }
                };
                let exit = command == Command::Exit;
                match tokio::task::block_in_place(|| listener.execute(command)) {
                    Ok(outcome) if !quiet => println!("{}", serde_json::to_string(&outcome)?),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("{} failed: {}", line.trim(), e),
                }
                if exit {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    tokio::task::spawn_blocking(move || listener.stop())
        .await
        .context("Listener shutdown task failed")??;
    Ok(())
}
