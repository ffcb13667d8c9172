use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use merge_2048::engine::{EngineConfig, GridEngine, Move};
use merge_2048::highscores::{HighScoreError, HighScores};
use merge_2048::session::GameSession;
use merge_2048::trace;
use rand::{rngs::StdRng, SeedableRng};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = EngineConfig { size: args.size, four_probability: args.four_probability };
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let engine = GridEngine::with_config(config, rng)?;
    let mut scores = HighScores::load(&args.scores)
        .with_context(|| format!("loading high scores from {}", args.scores.display()))?;
    let mut session = GameSession::new(args.player.as_str(), engine, &scores).with_seed(args.seed);

    println!("Move with w/a/s/d (or h/j/k/l, or up/down/left/right), q to quit.");
    let mut lines = io::stdin().lock().lines();
    for game in 0.. {
        render(&session);
        let end = play_game(&mut session, &mut lines)?;
        finish_game(&session, &mut scores, &args, game)?;
        if end != GameEnd::Over {
            break;
        }
        match next_game(&mut lines)? {
            Next::Again => {}
            Next::Player(name) => session.set_player(&name)?,
            Next::Quit => break,
        }
        session.restart()?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameEnd {
    Over,
    Quit,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Next {
    Again,
    Player(String),
    Quit,
}

fn play_game<I>(session: &mut GameSession, lines: &mut I) -> anyhow::Result<GameEnd>
where
    I: Iterator<Item = io::Result<String>>,
{
    prompt()?;
    for line in lines.by_ref() {
        let line = line?;
        for token in tokens(&line) {
            if token.eq_ignore_ascii_case("q") || token.eq_ignore_ascii_case("quit") {
                return Ok(GameEnd::Quit);
            }
            let direction = match token.parse::<Move>() {
                Ok(direction) => direction,
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };
            let report = session.turn(direction)?;
            if !report.turn.outcome.moved {
                continue;
            }
            render(session);
            if report.game_over {
                println!("Game over! Final score: {}", session.score());
                return Ok(GameEnd::Over);
            }
        }
        prompt()?;
    }
    Ok(GameEnd::Eof)
}

/// Bank the score and write the trace for the game that just ended.
fn finish_game(session: &GameSession, scores: &mut HighScores, args: &Args, game: usize) -> anyhow::Result<()> {
    if session.record_score(scores)? {
        scores
            .save(&args.scores)
            .with_context(|| format!("saving high scores to {}", args.scores.display()))?;
    }
    if let Some(base) = &args.trace {
        let path = trace_path(base, game);
        let record = session.to_record();
        trace::write_record_to_path(&path, &record)
            .with_context(|| format!("writing trace to {}", path.display()))?;
        info!("wrote {} steps to {}", record.steps.len(), path.display());
    }
    Ok(())
}

/// The first game's trace goes to `base`; later ones get `-2`, `-3`, ... before the extension.
fn trace_path(base: &Path, game: usize) -> PathBuf {
    if game == 0 {
        return base.to_path_buf();
    }
    let stem = base.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}-{}.{}", game + 1, ext.to_string_lossy()),
        None => format!("{stem}-{}", game + 1),
    };
    base.with_file_name(name)
}

fn next_game<I>(lines: &mut I) -> anyhow::Result<Next>
where
    I: Iterator<Item = io::Result<String>>,
{
    println!("Play again (p), new player (n) or quit (q)?");
    loop {
        prompt()?;
        let Some(line) = lines.next() else { return Ok(Next::Quit) };
        match line?.trim().to_ascii_lowercase().as_str() {
            "p" | "play" => return Ok(Next::Again),
            "q" | "quit" => return Ok(Next::Quit),
            "n" | "new" => {
                return Ok(match read_player(lines)? {
                    Some(name) => Next::Player(name),
                    None => Next::Quit,
                })
            }
            other => warn!("expected p, n or q, got {other:?}"),
        }
    }
}

/// Ask until a usable name comes in; `None` on end of input.
fn read_player<I>(lines: &mut I) -> anyhow::Result<Option<String>>
where
    I: Iterator<Item = io::Result<String>>,
{
    loop {
        print!("Player name: ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { return Ok(None) };
        match parse_player(&line?) {
            Ok(name) => return Ok(Some(name)),
            Err(e) => warn!("{e}"),
        }
    }
}

fn parse_player(name: &str) -> Result<String, HighScoreError> {
    HighScores::check_name(name)?;
    Ok(name.trim().to_string())
}

#[derive(Debug, Parser)]
#[command(name = "merge-2048", about = "Play 2048 in the terminal")]
struct Args {
    /// Name recorded in the high-score file
    #[arg(long, default_value = "player", value_parser = parse_player)]
    player: String,

    /// Board edge length
    #[arg(long, default_value_t = 4)]
    size: usize,

    /// Seed the tile RNG for a reproducible game
    #[arg(long)]
    seed: Option<u64>,

    /// Chance that a spawned tile is a 4 instead of a 2
    #[arg(long, default_value_t = 0.5)]
    four_probability: f64,

    /// High-score file (name:score:holder per line)
    #[arg(long, default_value = "highscores.txt")]
    scores: PathBuf,

    /// Write a binary trace of each game; games after the first get a numbered suffix
    #[arg(long)]
    trace: Option<PathBuf>,
}

/// Split input into moves: whole words like `left`, otherwise one move per character.
fn tokens(line: &str) -> Vec<String> {
    line.split_whitespace()
        .flat_map(|word| {
            if word.len() == 1 || word.parse::<Move>().is_ok() || word.eq_ignore_ascii_case("quit") {
                vec![word.to_string()]
            } else {
                word.chars().map(String::from).collect()
            }
        })
        .collect()
}

fn render(session: &GameSession) {
    println!("\n{}", session.board());
    match session.best() {
        Some((holder, best)) => println!("Score: {} | High score: {best} by {holder}", session.score()),
        None => println!("Score: {}", session.score()),
    }
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}
