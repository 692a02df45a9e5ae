//! Playback simulator (cardplay-sim) - Main entry point
//!
//! Replays a recorded JSON-lines trace of host operations through the
//! playback coordinator and prints every playback command as a JSON line on
//! stdout, followed by the final scheduler stats. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cardplay_common::config::{ConfigStore, PlaybackConfig};
use cardplay_engine::trace::{self, TraceOp};
use cardplay_engine::PlaybackCoordinator;
use clap::Parser;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cardplay-sim
#[derive(Parser, Debug)]
#[command(name = "cardplay-sim")]
#[command(about = "Replay a visibility trace through the playback scheduler")]
#[command(version)]
struct Args {
    /// JSON-lines trace of host operations
    #[arg(short, long, env = "CARDPLAY_TRACE")]
    trace: PathBuf,

    /// TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, env = "CARDPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Fire preview timers up to this time after the trace ends
    #[arg(long)]
    until_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PlaybackConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => PlaybackConfig::default(),
    };

    // Initialize tracing (RUST_LOG wins over the configured level)
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("cardplay_engine={level},cardplay_common={level},cardplay_sim={level}")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let content = tokio::fs::read_to_string(&args.trace)
        .await
        .with_context(|| format!("Failed to read trace {}", args.trace.display()))?;
    let ops = trace::parse_trace(&content).context("Invalid trace")?;
    info!("Replaying {} operation(s) from {}", ops.len(), args.trace.display());

    let store = Arc::new(ConfigStore::new(config).context("Invalid configuration")?);
    let coordinator = PlaybackCoordinator::new(store);
    let mut commands = coordinator.subscribe();

    for op in &ops {
        trace::apply(&coordinator, op);
        print_commands(&mut commands)?;
    }

    if let Some(until_ms) = args.until_ms {
        let last = ops.last().map(TraceOp::at_ms).unwrap_or(0);
        if until_ms < last {
            warn!("--until-ms {} is before the last trace operation ({}ms)", until_ms, last);
        } else {
            coordinator.advance_to(until_ms);
            print_commands(&mut commands)?;
        }
    }

    let stats = coordinator.stats();
    println!("{}", json!({ "stats": stats }));
    info!("Replay complete: {:?}", stats);
    Ok(())
}

/// Print every command received so far as one JSON line each
fn print_commands(rx: &mut broadcast::Receiver<cardplay_common::PlaybackCommand>) -> Result<()> {
    loop {
        match rx.try_recv() {
            Ok(command) => println!("{}", serde_json::to_string(&command)?),
            Err(broadcast::error::TryRecvError::Empty) => return Ok(()),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!("Command output lagged, {} command(s) dropped", skipped);
            }
            Err(broadcast::error::TryRecvError::Closed) => return Ok(()),
        }
    }
}
