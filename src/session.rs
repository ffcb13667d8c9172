//! One player's game: the engine plus everything a shell needs to show
//! around it (player name, best score and holder, move history).

use std::time::Instant;

use log::info;
use rand::rngs::StdRng;
use rand::Rng;

use crate::engine::{Board, EngineError, GridEngine, Move, Score, Turn};
use crate::highscores::{HighScoreError, HighScores};
use crate::trace::{self, GameRecord, Meta, Step};

/// What a shell needs to re-render after one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub turn: Turn,
    pub game_over: bool,
    /// The session's best score was raised by this turn.
    pub new_best: bool,
}

pub struct GameSession<R = StdRng> {
    player: String,
    engine: GridEngine<R>,
    best: Option<(String, Score)>,
    steps: Vec<Step>,
    seed: Option<u64>,
    started: Instant,
    start_unix_s: u64,
}

impl<R: Rng> GameSession<R> {
    /// Start tracking `engine`'s current game for `player`, seeding the
    /// best score from `scores`.
    pub fn new(player: impl Into<String>, engine: GridEngine<R>, scores: &HighScores) -> Self {
        GameSession {
            player: player.into(),
            engine,
            best: scores.best().map(|(name, score)| (name.to_string(), score)),
            steps: Vec::new(),
            seed: None,
            started: Instant::now(),
            start_unix_s: trace::now_unix_seconds(),
        }
    }

    /// Remember the seed the engine's RNG was built from, for the trace.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Play one direction: slide, spawn if anything moved, then update the best score.
    pub fn turn(&mut self, direction: Move) -> Result<TurnReport, EngineError> {
        let pre_board = self.engine.board().clone();
        let turn = self.engine.play(direction)?;
        if turn.outcome.moved {
            self.steps.push(Step {
                pre_board,
                direction,
                score_delta: turn.outcome.score_delta,
                spawned: turn.spawned,
            });
        }
        let new_best = self.lift_best();
        Ok(TurnReport { turn, game_over: self.engine.is_terminal(), new_best })
    }

    fn lift_best(&mut self) -> bool {
        let score = self.engine.score();
        match &self.best {
            Some((_, top)) if *top >= score => false,
            _ if score == 0 => false,
            _ => {
                if !matches!(&self.best, Some((holder, _)) if *holder == self.player) {
                    info!("{} takes the best score with {score}", self.player);
                }
                self.best = Some((self.player.clone(), score));
                true
            }
        }
    }

    /// New game on the same board size. The seed no longer describes it.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        let size = self.engine.size();
        self.engine.reset(size)?;
        self.steps.clear();
        self.seed = None;
        self.started = Instant::now();
        self.start_unix_s = trace::now_unix_seconds();
        Ok(())
    }

    pub fn is_over(&self) -> bool { self.engine.is_terminal() }
}

impl<R> GameSession<R> {
    pub fn player(&self) -> &str { &self.player }

    /// Hand the session to another player. The name has to fit the
    /// high-score file, so it is checked here rather than when the score is saved.
    pub fn set_player(&mut self, player: &str) -> Result<(), HighScoreError> {
        HighScores::check_name(player)?;
        self.player = player.trim().to_string();
        Ok(())
    }

    pub fn board(&self) -> &Board { self.engine.board() }

    pub fn score(&self) -> Score { self.engine.score() }

    pub fn engine(&self) -> &GridEngine<R> { &self.engine }

    /// Best score known to this session and who holds it.
    pub fn best(&self) -> Option<(&str, Score)> {
        self.best.as_ref().map(|(name, score)| (name.as_str(), *score))
    }

    /// Moves that changed the board, oldest first.
    pub fn steps(&self) -> &[Step] { &self.steps }

    /// Write this player's current score into `scores`.
    pub fn record_score(&self, scores: &mut HighScores) -> Result<bool, HighScoreError> {
        scores.record(&self.player, self.engine.score())
    }

    pub fn to_record(&self) -> GameRecord {
        let board = self.engine.board();
        GameRecord {
            meta: Meta {
                player: self.player.clone(),
                size: board.size() as u32,
                seed: self.seed,
                start_unix_s: self.start_unix_s,
                elapsed_s: self.started.elapsed().as_secs_f32(),
                final_score: self.engine.score(),
                highest_tile: board.highest_tile(),
            },
            steps: self.steps.clone(),
            final_board: board.clone(),
        }
    }
}
