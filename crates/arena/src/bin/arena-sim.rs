//! AlgoWar demo tournament
//!
//! Registers the sample strategies, plays a full round-robin and prints every
//! event as one JSON object per line on stdout. Logs go to stderr.
//!
//! # Example
//!
//! ```bash
//! # Three-player round-robin with the default config
//! arena-sim
//!
//! # Two-player, 100 rounds, then a showdown between the top 3
//! arena-sim --match-size 2 --rounds 100 --showdown 3
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use arena::logging::init_tracing;
use arena::{Arena, ArenaConfig, ArenaEvent};
use clap::Parser;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "arena-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON config file. Without it, ARENA_* environment variables apply.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Participants per match (2 or 3)
    #[arg(short = 'n', long)]
    match_size: Option<usize>,

    /// Rounds per match
    #[arg(short, long)]
    rounds: Option<u32>,

    /// After the round-robin, run a showdown between the top K
    #[arg(long, value_name = "K")]
    showdown: Option<usize>,

    /// Leave match_progress events out of the output
    #[arg(long)]
    quiet_progress: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ArenaConfig::from_json_file(path)?,
        None => ArenaConfig::from_env(),
    };
    if let Some(n) = args.match_size {
        config = config.with_match_size(n);
        // The reference table follows the match size unless one was given
        if config.payoff.as_ref().map_or(false, |t| t.match_size() != n) {
            config.payoff = None;
        }
    }
    if let Some(rounds) = args.rounds {
        config = config.with_rounds(rounds);
    }
    init_tracing(&config);

    let arena = Arena::new(config).context("invalid arena configuration")?;
    for sample in arena.sample_strategies() {
        arena
            .register(sample.name, &sample.code)
            .with_context(|| format!("registering sample strategy {:?}", sample.name))?;
    }
    info!(
        participants = arena.participants().len(),
        match_size = arena.config().match_size,
        rounds = arena.config().rounds_per_match,
        "Starting demo tournament"
    );

    let (_, mut events) = arena.subscribe();
    arena.start()?;
    drain(&mut events, !args.quiet_progress).await?;

    if let Some(k) = args.showdown {
        let finalists = arena.top_participants(k);
        info!(?finalists, "Starting showdown");
        arena.start_showdown(&finalists)?;
        drain(&mut events, !args.quiet_progress).await?;
    }

    for entry in arena.leaderboard().entries() {
        eprintln!(
            "{:>3}. {:<24} {:>6} pts  {:>5.1}% coop  {} matches",
            entry.rank, entry.name, entry.total_score, entry.cooperation_pct, entry.matches_played
        );
    }
    Ok(())
}

/// Print events until the run finishes.
async fn drain(events: &mut broadcast::Receiver<ArenaEvent>, progress: bool) -> anyhow::Result<()> {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event stream lagged");
                continue;
            }
            Err(RecvError::Closed) => bail!("event stream closed"),
        };

        if progress || !matches!(event, ArenaEvent::MatchProgress { .. }) {
            println!("{}", serde_json::to_string(&event)?);
        }
        match event {
            ArenaEvent::TournamentFinished { .. } => return Ok(()),
            ArenaEvent::TournamentError { message } => bail!("tournament failed: {}", message),
            _ => {}
        }
    }
}
