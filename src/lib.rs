//! merge-2048: the grid engine of a 2048-style sliding tile puzzle
//!
//! This crate provides:
//! - An N×N `Board` with one slide/merge algorithm for all four directions (`engine::Board::shift`)
//! - A `GridEngine` owning board, score and an injectable tile RNG (`engine` module)
//! - A `GameSession` carrying the per-game state a shell renders (`session` module)
//! - The `name:score:holder` high-score file (`highscores` module)
//! - A checksummed binary record of finished games, with replay verification (`trace` module)
//!
//! Quick start:
//! ```
//! use merge_2048::engine::{GridEngine, Move};
//!
//! // Deterministic engine with a seeded RNG
//! let mut engine = GridEngine::seeded(4, 42).unwrap();
//! assert_eq!(engine.board().count_empty(), 14);
//!
//! let outcome = engine.apply_move(Move::Left);
//! if outcome.moved {
//!     engine.spawn_tile().unwrap();
//! }
//! assert!(!engine.is_terminal());
//! ```
//!
//! Full loop with a session
//! ```
//! use merge_2048::engine::{GridEngine, Move};
//! use merge_2048::highscores::HighScores;
//! use merge_2048::session::GameSession;
//!
//! let mut scores = HighScores::new();
//! let engine = GridEngine::seeded(4, 123).unwrap();
//! let mut session = GameSession::new("ann", engine, &scores).with_seed(Some(123));
//!
//! for dir in Move::ALL.iter().cycle().take(8) {
//!     let report = session.turn(*dir).unwrap();
//!     if report.game_over {
//!         break;
//!     }
//! }
//! session.record_score(&mut scores).unwrap();
//! assert_eq!(scores.get("ann"), Some(session.score()));
//! ```
//!
pub mod engine;
pub mod highscores;
pub mod session;
pub mod trace;
