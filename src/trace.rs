use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::{Board, Move, Score, Spawned, Tile};

const MAGIC: &[u8; 4] = b"M2T1"; // ASCII magic
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub player: String,
    pub size: u32,
    /// Seed of the tile RNG, when the game is reproducible from it.
    pub seed: Option<u64>,
    pub start_unix_s: u64,
    pub elapsed_s: f32,
    pub final_score: Score,
    pub highest_tile: Tile,
}

/// One move that changed the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Board before the move.
    pub pre_board: Board,
    pub direction: Move,
    pub score_delta: Score,
    pub spawned: Option<Spawned>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub meta: Meta,
    pub steps: Vec<Step>,
    pub final_board: Board,
}

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("invalid magic")]
    Magic,
    #[error("checksum mismatch")]
    Checksum,
    #[error("file too short or malformed")]
    Malformed,
    #[error("replay diverged at step {step}: {reason}")]
    Replay { step: usize, reason: String },
}

/// Magic, postcard payload, then a little-endian CRC32C of everything before it.
pub fn encode_record(record: &GameRecord) -> Result<Vec<u8>, TraceError> {
    let payload = postcard::to_allocvec(record)?;
    let mut buf = Vec::with_capacity(MAGIC.len() + payload.len() + CHECKSUM_LEN);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&payload);
    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

pub fn decode_record(bytes: &[u8]) -> Result<GameRecord, TraceError> {
    if bytes.len() < MAGIC.len() + CHECKSUM_LEN {
        return Err(TraceError::Malformed);
    }
    // Validate checksum before touching the payload
    let (content, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let file_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if file_crc != crc32c::crc32c(content) {
        return Err(TraceError::Checksum);
    }
    if &content[..MAGIC.len()] != MAGIC {
        return Err(TraceError::Magic);
    }
    Ok(postcard::from_bytes(&content[MAGIC.len()..])?)
}

pub fn write_record_to_path<P: AsRef<Path>>(path: P, record: &GameRecord) -> Result<(), TraceError> {
    let bytes = encode_record(record)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub fn read_record_from_path<P: AsRef<Path>>(path: P) -> Result<GameRecord, TraceError> {
    let bytes = fs::read(path)?;
    decode_record(&bytes)
}

/// Replay every step and check it lands on the next recorded board.
///
/// The last step must land on `final_board`, and the score deltas must add
/// up to `meta.final_score`.
pub fn verify(record: &GameRecord) -> Result<(), TraceError> {
    let diverged = |step: usize, reason: String| TraceError::Replay { step, reason };
    let mut total: Score = 0;
    for (idx, step) in record.steps.iter().enumerate() {
        step.pre_board.check().map_err(|e| diverged(idx, e.to_string()))?;
        let outcome = step.pre_board.shift(step.direction);
        if !outcome.moved {
            return Err(diverged(idx, format!("{} does not move the board", step.direction)));
        }
        if outcome.score_delta != step.score_delta {
            return Err(diverged(
                idx,
                format!("score delta {} recorded, {} replayed", step.score_delta, outcome.score_delta),
            ));
        }
        let mut next = outcome.board;
        if let Some(spawned) = step.spawned {
            if !matches!(spawned.value, 2 | 4) || !next.place(spawned) {
                return Err(diverged(idx, format!("cannot spawn {} at cell {}", spawned.value, spawned.index)));
            }
        }
        let expected = record.steps.get(idx + 1).map_or(&record.final_board, |s| &s.pre_board);
        if &next != expected {
            return Err(diverged(idx, "board after move does not match the record".to_string()));
        }
        total += step.score_delta;
    }
    let end = record.steps.len();
    record.final_board.check().map_err(|e| diverged(end, e.to_string()))?;
    if record.final_board.size() as u32 != record.meta.size {
        return Err(diverged(end, format!("final board is not {0}x{0}", record.meta.size)));
    }
    if total != record.meta.final_score {
        return Err(diverged(end, format!("steps add up to {total}, meta says {}", record.meta.final_score)));
    }
    Ok(())
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
