//! # Trackwork - Media Library Background Tasks
//!
//! The background work scheduler of a desktop media-library manager: a fixed
//! pool of worker slots arbitrated every tick among independent sources of
//! maintenance work (audio analysis, file relocation, metadata refresh,
//! export regeneration) plus an explicit user-submitted FIFO queue.
//!
//! ## Features
//!
//! - **Priority Arbitration**: Every tick, the most urgent provider is served first
//! - **Bounded Concurrency**: A small worker pool keeps disk/CPU/network usage sane
//! - **Exempt Work**: User-visible-latency work bypasses the pool entirely
//! - **Cancellation**: Cooperative cancel with a structurally single-shot completion
//! - **Graceful Shutdown**: Quit handshake that warns, drops pending work, and cancels
//!
//! ## Usage
//!
//! ```bash
//! # Run the scheduler over simulated work for a music library
//! trackwork simulate /path/to/music
//!
//! # Synthetic tracks, custom pool size and cadence
//! trackwork simulate --slots 2 --tick-ms 50
//!
//! # Machine-readable activity snapshots
//! trackwork simulate --json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trackwork::commands::simulate::SimulateCommand;
use trackwork::config::SchedulerConfig;

/// Trackwork - background task scheduling for a desktop media library
#[derive(Parser)]
#[command(
    name = "trackwork",
    about = "Background task scheduling for a desktop media library",
    long_about = "Arbitrates a small pool of worker slots among competing background work sources: queued user actions, ambient maintenance, and latency-critical analysis of the currently playing track.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler against simulated media-library maintenance work
    Simulate {
        /// Path to a music library to scan for audio files (synthetic tracks when omitted)
        path: Option<PathBuf>,
        /// Number of concurrent worker slots
        #[arg(long, short = 's')]
        slots: Option<usize>,
        /// Scheduling tick interval in milliseconds
        #[arg(long, short = 't')]
        tick_ms: Option<u64>,
        /// Stop after this many seconds even if work remains
        #[arg(long, short = 'd')]
        duration_secs: Option<u64>,
        /// Emit activity snapshots as JSON lines instead of a spinner
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trackwork=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            path,
            slots,
            tick_ms,
            duration_secs,
            json,
        } => {
            let mut config = SchedulerConfig::from_env();
            if let Some(slots) = slots {
                config.worker_slots = slots;
            }
            if let Some(tick_ms) = tick_ms {
                config.tick_interval_ms = tick_ms;
            }

            info!(
                "Starting simulate command for path: {:?}, slots: {}, tick: {}ms",
                path, config.worker_slots, config.tick_interval_ms
            );
            SimulateCommand::new(path, config, duration_secs, json)
                .execute()
                .await
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
