use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use merge_2048::engine::{EngineConfig, GridEngine, Move, Score, Tile};
use merge_2048::highscores::HighScores;
use merge_2048::session::GameSession;
use merge_2048::trace;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;

// Keeps the move picker's stream apart from the tile spawner's.
const POLICY_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = EngineConfig { size: args.size, four_probability: args.four_probability };
    config.validate()?;
    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir)?;
    }

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(args.games);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:40}] {pos}/{len} games | {per_sec}")?
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃")
                .progress_chars("=> "),
        );
        pb
    };

    let start = Instant::now();
    let summaries = (0..args.games)
        .into_par_iter()
        .map(|game| {
            let summary = play_one(&args, config, game);
            pb.inc(1);
            summary
        })
        .collect::<anyhow::Result<Vec<GameSummary>>>()?;
    pb.finish_and_clear();

    let elapsed = start.elapsed().as_secs_f64().max(1e-6);
    report(&summaries, elapsed);
    Ok(())
}

#[derive(Debug, Parser)]
#[command(name = "simulate", about = "Play many random-move 2048 games in parallel")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 100)]
    games: u64,

    /// Board edge length
    #[arg(long, default_value_t = 4)]
    size: usize,

    /// Game i uses seed + i for its tile RNG
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Chance that a spawned tile is a 4 instead of a 2
    #[arg(long, default_value_t = 0.5)]
    four_probability: f64,

    /// Per-game: stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Verify and write each game's trace into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy)]
struct GameSummary {
    score: Score,
    highest_tile: Tile,
    moves: u64,
}

/// Pick uniformly among the directions that change the board until none remain.
fn play_one(args: &Args, config: EngineConfig, game: u64) -> anyhow::Result<GameSummary> {
    let seed = args.seed.wrapping_add(game);
    let engine = GridEngine::with_config(config, StdRng::seed_from_u64(seed))?;
    let mut session = GameSession::new(format!("sim-{game}"), engine, &HighScores::new()).with_seed(Some(seed));
    let mut policy = StdRng::seed_from_u64(seed ^ POLICY_SALT);
    let mut moves = 0u64;
    loop {
        if args.steps.is_some_and(|limit| moves >= limit) {
            break;
        }
        let legal: Vec<Move> = Move::ALL
            .iter()
            .copied()
            .filter(|&dir| session.board().shift(dir).moved)
            .collect();
        let Some(&dir) = legal.choose(&mut policy) else { break };
        session.turn(dir)?;
        moves += 1;
    }

    if let Some(dir) = &args.out_dir {
        let record = session.to_record();
        trace::verify(&record)?;
        trace::write_record_to_path(dir.join(format!("game-{game:06}.m2t")), &record)?;
    }
    Ok(GameSummary { score: session.score(), highest_tile: session.board().highest_tile(), moves })
}

fn report(summaries: &[GameSummary], elapsed: f64) {
    if summaries.is_empty() {
        println!("No games played.");
        return;
    }
    let games = summaries.len() as f64;
    let total_moves: u64 = summaries.iter().map(|s| s.moves).sum();
    let mean_score = summaries.iter().map(|s| s.score as f64).sum::<f64>() / games;
    let max_score = summaries.iter().map(|s| s.score).max().unwrap_or(0);
    let mut tiles: BTreeMap<Tile, u64> = BTreeMap::new();
    for s in summaries {
        *tiles.entry(s.highest_tile).or_default() += 1;
    }

    println!(
        "Games: {} | mean score: {:.1} | max score: {} | mean moves: {:.1} | moves/sec: {:.1}",
        summaries.len(),
        mean_score,
        max_score,
        total_moves as f64 / games,
        total_moves as f64 / elapsed
    );
    println!("Highest tile reached:");
    for (tile, count) in tiles.iter().rev() {
        println!("{tile:>7} | {count:>6} ({:.1}%)", 100.0 * *count as f64 / games);
    }
    info!("simulated {} games in {:.2}s", summaries.len(), elapsed);
}
