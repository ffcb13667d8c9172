use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// Every direction, in a fixed order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognised direction {0:?}")]
pub struct ParseMoveError(pub String);

/// Accepts `w/a/s/d`, `k/h/j/l` and the full names, case-insensitively.
impl FromStr for Move {
    type Err = ParseMoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "k" | "up" => Ok(Move::Up),
            "s" | "j" | "down" => Ok(Move::Down),
            "a" | "h" | "left" => Ok(Move::Left),
            "d" | "l" | "right" => Ok(Move::Right),
            _ => Err(ParseMoveError(s.to_string())),
        }
    }
}

pub type Tile = u32;
pub type Score = u64;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("no empty cell to spawn a tile into")]
    NoEmptyCell,
    #[error("cell {index} holds {value}, which is neither 0 nor a power of two")]
    InvalidTile { index: usize, value: Tile },
}

/// Knobs for a `GridEngine`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Board edge length (N for an N×N board).
    pub size: usize,
    /// Chance that a spawned tile is a 4 rather than a 2.
    pub four_probability: f64,
}

impl Default for EngineConfig {
    fn default() -> Self { EngineConfig { size: 4, four_probability: 0.5 } }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        check_size(self.size)?;
        check_probability(self.four_probability)
    }
}

fn check_size(size: usize) -> Result<(), EngineError> {
    if (Board::MIN_SIZE..=Board::MAX_SIZE).contains(&size) {
        Ok(())
    } else {
        Err(EngineError::InvalidConfiguration(format!(
            "board size {size} outside {}..={}",
            Board::MIN_SIZE,
            Board::MAX_SIZE
        )))
    }
}

fn check_probability(p: f64) -> Result<(), EngineError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(EngineError::InvalidConfiguration(format!("four probability {p} outside [0, 1]")))
    }
}

/// Where a spawned tile landed (row-major cell index) and what it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spawned {
    pub index: usize,
    pub value: Tile,
}

/// Result of sliding a board in one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub board: Board,
    pub score_delta: Score,
    /// True iff any cell differs from the board before the move.
    pub moved: bool,
}

/// A move followed by the spawn it earned, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub outcome: MoveOutcome,
    pub spawned: Option<Spawned>,
}

/// Square board of tile values stored row-major, 0 meaning empty.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBoard")]
pub struct Board {
    size: usize,
    cells: Vec<Tile>,
}

// Decoded boards go through `Board::check` before anyone can use them.
#[derive(Deserialize)]
struct RawBoard {
    size: usize,
    cells: Vec<Tile>,
}

impl TryFrom<RawBoard> for Board {
    type Error = EngineError;

    fn try_from(raw: RawBoard) -> Result<Self, Self::Error> { Board::from_cells(raw.size, raw.cells) }
}

impl Board {
    pub const MIN_SIZE: usize = 2;
    pub const MAX_SIZE: usize = 16;
    /// Largest tile a `Tile` can hold. Two of these never merge.
    pub const MAX_TILE: Tile = 1 << 31;

    /// An all-empty `size`×`size` board.
    pub fn empty(size: usize) -> Result<Self, EngineError> {
        check_size(size)?;
        Ok(Board { size, cells: vec![0; size * size] })
    }

    /// Build a board from row-major cells.
    ///
    /// Every value must be 0 or a power of two, and there must be exactly
    /// `size * size` of them.
    pub fn from_cells(size: usize, cells: Vec<Tile>) -> Result<Self, EngineError> {
        let board = Board { size, cells };
        board.check()?;
        Ok(board)
    }

    /// Build a board from a square slice of rows.
    ///
    /// ```
    /// use merge_2048::engine::Board;
    /// let b = Board::from_rows(&[[2u32, 0], [0, 4]]).unwrap();
    /// assert_eq!(b.get(1, 1), 4);
    /// ```
    pub fn from_rows<T: AsRef<[Tile]>>(rows: &[T]) -> Result<Self, EngineError> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for (row_idx, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != size {
                return Err(EngineError::InvalidConfiguration(format!(
                    "row {row_idx} has {} cells, expected {size}",
                    row.len()
                )));
            }
            cells.extend_from_slice(row);
        }
        Board::from_cells(size, cells)
    }

    /// Validate size, cell count and tile values.
    pub fn check(&self) -> Result<(), EngineError> {
        check_size(self.size)?;
        if self.cells.len() != self.size * self.size {
            return Err(EngineError::InvalidConfiguration(format!(
                "{} cells for a {}x{} board",
                self.cells.len(),
                self.size,
                self.size
            )));
        }
        match self.cells.iter().position(|&v| v != 0 && !v.is_power_of_two()) {
            Some(index) => Err(EngineError::InvalidTile { index, value: self.cells[index] }),
            None => Ok(()),
        }
    }

    #[inline]
    pub fn size(&self) -> usize { self.size }

    /// Row-major view of every cell.
    #[inline]
    pub fn cells(&self) -> &[Tile] { &self.cells }

    /// Value at (`row`, `col`). Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Tile {
        assert!(col < self.size, "column {col} out of bounds");
        self.cells[row * self.size + col]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> + '_ { self.cells.chunks(self.size) }

    pub fn count_empty(&self) -> usize { self.cells.iter().filter(|&&v| v == 0).count() }

    /// The highest tile value present, 0 on an empty board.
    pub fn highest_tile(&self) -> Tile { self.cells.iter().copied().max().unwrap_or(0) }

    /// Sum of every tile on the board.
    pub fn tile_sum(&self) -> Score { self.cells.iter().map(|&v| Score::from(v)).sum() }

    /// Slide and merge every line toward `direction`. No randomness.
    ///
    /// ```
    /// use merge_2048::engine::{Board, Move};
    /// let b = Board::from_rows(&[[2u32, 2, 4, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let out = b.shift(Move::Left);
    /// assert!(out.moved);
    /// assert_eq!(out.score_delta, 4);
    /// assert_eq!(out.board.rows().next().unwrap(), &[4, 4, 0, 0]);
    /// ```
    pub fn shift(&self, direction: Move) -> MoveOutcome {
        let mut next = self.clone();
        let mut score_delta = 0;
        let mut line = Vec::with_capacity(self.size);
        for line_idx in 0..self.size {
            line.clear();
            line.extend(lane(self.size, direction, line_idx).map(|cell| self.cells[cell]));
            score_delta += slide_line(&mut line);
            for (cell, &value) in lane(self.size, direction, line_idx).zip(line.iter()) {
                next.cells[cell] = value;
            }
        }
        let moved = next.cells != self.cells;
        MoveOutcome { board: next, score_delta, moved }
    }

    /// True if no empty cell and no horizontally or vertically adjacent equal pair remain.
    pub fn is_terminal(&self) -> bool {
        let n = self.size;
        for row in 0..n {
            for col in 0..n {
                let val = self.cells[row * n + col];
                if val == 0 {
                    return false;
                }
                if val == Board::MAX_TILE {
                    continue;
                }
                if col + 1 < n && self.cells[row * n + col + 1] == val {
                    return false;
                }
                if row + 1 < n && self.cells[(row + 1) * n + col] == val {
                    return false;
                }
            }
        }
        true
    }

    /// Put a 4 (with probability `four_probability`) or a 2 into a uniformly chosen empty cell.
    pub fn spawn_random_tile<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        four_probability: f64,
    ) -> Result<Spawned, EngineError> {
        check_probability(four_probability)?;
        let empty = self.count_empty();
        if empty == 0 {
            return Err(EngineError::NoEmptyCell);
        }
        let nth = rng.gen_range(0..empty);
        let index = self
            .cells
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == 0)
            .nth(nth)
            .map(|(idx, _)| idx)
            .ok_or(EngineError::NoEmptyCell)?;
        let value = if rng.gen_bool(four_probability) { 4 } else { 2 };
        self.cells[index] = value;
        Ok(Spawned { index, value })
    }

    #[cfg(test)]
    pub(crate) fn unchecked(size: usize, cells: Vec<Tile>) -> Board { Board { size, cells } }

    pub(crate) fn place(&mut self, spawned: Spawned) -> bool {
        match self.cells.get_mut(spawned.index) {
            Some(cell) if *cell == 0 => {
                *cell = spawned.value;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({}x{} ", self.size, self.size)?;
        f.debug_list().entries(self.rows()).finish()?;
        f.write_str(")")
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(self.size * 8 - 1);
        for (row_idx, row) in self.rows().enumerate() {
            if row_idx > 0 {
                writeln!(f, "{rule}")?;
            }
            let line: Vec<String> = row.iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", line.join("|"))?;
        }
        Ok(())
    }
}

fn format_val(val: Tile) -> String {
    match val {
        0 => " ".repeat(7),
        x => format!("{x:^7}"),
    }
}

/// Cell indices of one line, leading edge first.
///
/// Every direction is the same walk with a different start and stride.
fn lane(size: usize, direction: Move, line: usize) -> impl Iterator<Item = usize> {
    let n = size as isize;
    let line = line as isize;
    let (start, step) = match direction {
        Move::Left => (line * n, 1),
        Move::Right => (line * n + n - 1, -1),
        Move::Up => (line, n),
        Move::Down => ((n - 1) * n + line, -n),
    };
    (0..n).map(move |k| (start + k * step) as usize)
}

struct Slot {
    value: Tile,
    merged: bool,
}

/// Compact and merge a line toward index 0, returning the score gained.
///
/// A slot that absorbed a tile this move is marked and never merges again.
/// Tiles at `Board::MAX_TILE` stay put.
fn slide_line(line: &mut [Tile]) -> Score {
    let mut emitted: Vec<Slot> = Vec::with_capacity(line.len());
    let mut gained = 0;
    for &value in line.iter().filter(|&&v| v != 0) {
        match emitted.last_mut() {
            Some(slot) if !slot.merged && slot.value == value && value < Board::MAX_TILE => {
                slot.value *= 2;
                slot.merged = true;
                gained += Score::from(slot.value);
            }
            _ => emitted.push(Slot { value, merged: false }),
        }
    }
    let packed = emitted.iter().map(|slot| slot.value).chain(std::iter::repeat(0));
    for (cell, value) in line.iter_mut().zip(packed) {
        *cell = value;
    }
    gained
}

/// Owns one game's board, score and tile RNG.
///
/// ```
/// use merge_2048::engine::{GridEngine, Move};
/// let mut engine = GridEngine::seeded(4, 7).unwrap();
/// assert_eq!(engine.board().count_empty(), 14);
/// let turn = engine.play(Move::Left).unwrap();
/// assert_eq!(turn.spawned.is_some(), turn.outcome.moved);
/// ```
pub struct GridEngine<R = StdRng> {
    config: EngineConfig,
    board: Board,
    score: Score,
    rng: R,
}

impl GridEngine<StdRng> {
    /// Engine with default tile odds and an entropy-seeded RNG.
    pub fn new(size: usize) -> Result<Self, EngineError> {
        GridEngine::with_config(EngineConfig { size, ..EngineConfig::default() }, StdRng::from_entropy())
    }

    /// Deterministic engine for replays and tests.
    pub fn seeded(size: usize, seed: u64) -> Result<Self, EngineError> {
        GridEngine::with_config(EngineConfig { size, ..EngineConfig::default() }, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> GridEngine<R> {
    /// Validate `config` and start a fresh game on it.
    pub fn with_config(config: EngineConfig, rng: R) -> Result<Self, EngineError> {
        config.validate()?;
        let mut engine = GridEngine { config, board: Board::empty(config.size)?, score: 0, rng };
        engine.reset(config.size)?;
        Ok(engine)
    }

    /// Clear the board to `size`×`size`, zero the score and spawn two tiles.
    pub fn reset(&mut self, size: usize) -> Result<&Board, EngineError> {
        let board = Board::empty(size)?;
        self.config.size = size;
        self.board = board;
        self.score = 0;
        self.spawn_tile()?;
        self.spawn_tile()?;
        debug!("reset {size}x{size} board: {:?}", self.board);
        Ok(&self.board)
    }

    /// Replace the current position, e.g. to resume a saved game.
    pub fn restore(&mut self, board: Board, score: Score) -> Result<(), EngineError> {
        board.check()?;
        self.config.size = board.size();
        self.board = board;
        self.score = score;
        Ok(())
    }

    pub fn spawn_tile(&mut self) -> Result<Spawned, EngineError> {
        let spawned = self.board.spawn_random_tile(&mut self.rng, self.config.four_probability)?;
        debug!("spawned {} at cell {}", spawned.value, spawned.index);
        Ok(spawned)
    }

    /// Slide the owned board and bank the score. Never spawns.
    pub fn apply_move(&mut self, direction: Move) -> MoveOutcome {
        let outcome = self.board.shift(direction);
        if outcome.moved {
            self.board = outcome.board.clone();
            self.score += outcome.score_delta;
        }
        outcome
    }

    /// `apply_move`, then `spawn_tile` if the board changed.
    pub fn play(&mut self, direction: Move) -> Result<Turn, EngineError> {
        let outcome = self.apply_move(direction);
        let spawned = if outcome.moved { Some(self.spawn_tile()?) } else { None };
        Ok(Turn { outcome, spawned })
    }

    #[inline]
    pub fn is_terminal(&self) -> bool { self.board.is_terminal() }
}

impl<R> GridEngine<R> {
    #[inline]
    pub fn board(&self) -> &Board { &self.board }

    #[inline]
    pub fn score(&self) -> Score { self.score }

    #[inline]
    pub fn size(&self) -> usize { self.board.size() }

    #[inline]
    pub fn config(&self) -> &EngineConfig { &self.config }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[Tile]) -> (Vec<Tile>, Score) {
        let mut line = values.to_vec();
        let gained = slide_line(&mut line);
        (line, gained)
    }

    fn board(rows: &[[Tile; 4]]) -> Board { Board::from_rows(rows).unwrap() }

    #[test]
    fn it_slide_line() {
        assert_eq!(row(&[0, 0, 0, 0]), (vec![0, 0, 0, 0], 0));
        assert_eq!(row(&[2, 4, 2, 4]), (vec![2, 4, 2, 4], 0));
        assert_eq!(row(&[2, 2, 4, 4]), (vec![4, 8, 0, 0], 12));
        assert_eq!(row(&[2, 0, 0, 2]), (vec![4, 0, 0, 0], 4));
        assert_eq!(row(&[0, 0, 0, 8]), (vec![8, 0, 0, 0], 0));
    }

    #[test]
    fn scenario_a_merge_then_slide() {
        assert_eq!(row(&[2, 2, 4, 0]), (vec![4, 4, 0, 0], 4));
    }

    #[test]
    fn scenario_b_leading_pair_merges_first() {
        assert_eq!(row(&[2, 0, 2, 2]), (vec![4, 2, 0, 0], 4));
        assert_eq!(row(&[2, 2, 2, 0]), (vec![4, 2, 0, 0], 4));
    }

    #[test]
    fn merged_tile_does_not_merge_again() {
        assert_eq!(row(&[2, 2, 2, 2]), (vec![4, 4, 0, 0], 8));
        assert_eq!(row(&[4, 2, 2, 0]), (vec![4, 4, 0, 0], 4));
        assert_eq!(row(&[8, 4, 4, 8]), (vec![8, 8, 8, 0], 8));
    }

    #[test]
    fn test_move_left() {
        let game = board(&[[2, 4, 8, 16], [2, 8, 8, 4], [4, 0, 0, 4], [2, 0, 0, 4]]);
        let out = game.shift(Move::Left);
        assert_eq!(out.board, board(&[[2, 4, 8, 16], [2, 16, 4, 0], [8, 0, 0, 0], [2, 4, 0, 0]]));
        assert_eq!(out.score_delta, 24);
        assert!(out.moved);
    }

    #[test]
    fn test_move_right() {
        let game = board(&[[2, 4, 8, 16], [2, 8, 8, 4], [4, 0, 0, 4], [2, 0, 0, 4]]);
        let out = game.shift(Move::Right);
        assert_eq!(out.board, board(&[[2, 4, 8, 16], [0, 2, 16, 4], [0, 0, 0, 8], [0, 0, 2, 4]]));
        assert_eq!(out.score_delta, 24);
    }

    #[test]
    fn test_move_up() {
        let game = board(&[[2, 2, 4, 2], [4, 8, 0, 0], [8, 8, 0, 0], [16, 4, 4, 4]]);
        let out = game.shift(Move::Up);
        assert_eq!(out.board, board(&[[2, 2, 8, 2], [4, 16, 0, 4], [8, 4, 0, 0], [16, 0, 0, 0]]));
        assert_eq!(out.score_delta, 24);
    }

    #[test]
    fn test_move_down() {
        let game = board(&[[2, 2, 4, 2], [4, 8, 0, 0], [8, 8, 0, 0], [16, 4, 4, 4]]);
        let out = game.shift(Move::Down);
        assert_eq!(out.board, board(&[[2, 0, 0, 0], [4, 2, 0, 0], [8, 16, 0, 2], [16, 4, 8, 4]]));
        assert_eq!(out.score_delta, 24);
    }

    #[test]
    fn pure_slide_counts_as_moved() {
        let game = board(&[[0, 0, 0, 2], [0; 4], [0; 4], [0; 4]]);
        let out = game.shift(Move::Left);
        assert!(out.moved);
        assert_eq!(out.score_delta, 0);
        assert_eq!(out.board.get(0, 0), 2);
    }

    #[test]
    fn no_op_direction_leaves_board_alone() {
        let game = board(&[[2, 4, 0, 0], [8, 0, 0, 0], [0; 4], [0; 4]]);
        let out = game.shift(Move::Left);
        assert!(!out.moved);
        assert_eq!(out.board, game);
        assert!(!out.board.shift(Move::Left).moved);
    }

    #[test]
    fn scenario_c_full_board_without_pairs_is_terminal() {
        let game = board(&[[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert!(game.is_terminal());
        for dir in Move::ALL {
            assert!(!game.shift(dir).moved);
        }
    }

    #[test]
    fn full_board_with_a_pair_is_not_terminal() {
        let horizontal = board(&[[2, 2, 8, 4], [4, 8, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        assert!(!horizontal.is_terminal());
        let vertical = board(&[[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 8], [4, 2, 4, 8]]);
        assert!(!vertical.is_terminal());
        assert!(!board(&[[0; 4]; 4]).is_terminal());
    }

    #[test]
    fn scenario_d_reset_spawns_two_tiles() {
        for seed in 0..32 {
            let engine = GridEngine::seeded(4, seed).unwrap();
            let tiles: Vec<Tile> = engine.board().cells().iter().copied().filter(|&v| v != 0).collect();
            assert_eq!(tiles.len(), 2);
            assert!(tiles.iter().all(|&v| v == 2 || v == 4));
            assert_eq!(engine.score(), 0);
        }
    }

    #[test]
    fn reset_rejects_small_boards() {
        assert!(matches!(GridEngine::seeded(1, 0), Err(EngineError::InvalidConfiguration(_))));
        assert!(matches!(GridEngine::seeded(0, 0), Err(EngineError::InvalidConfiguration(_))));
        let mut engine = GridEngine::seeded(4, 0).unwrap();
        let before = engine.board().clone();
        assert!(matches!(engine.reset(1), Err(EngineError::InvalidConfiguration(_))));
        assert_eq!(engine.board(), &before);
        assert_eq!(engine.reset(5).unwrap().size(), 5);
        assert_eq!(engine.board().count_empty(), 23);
    }

    #[test]
    fn config_rejects_bad_probability() {
        let cfg = EngineConfig { size: 4, four_probability: 1.5 };
        let res = GridEngine::with_config(cfg, StdRng::seed_from_u64(0));
        assert!(matches!(res, Err(EngineError::InvalidConfiguration(_))));
        let nan = EngineConfig { size: 4, four_probability: f64::NAN };
        assert!(nan.validate().is_err());
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn scenario_e_single_empty_cell() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut game = board(&[[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 0, 4], [4, 2, 4, 2]]);
        let spawned = game.spawn_random_tile(&mut rng, 0.5).unwrap();
        assert_eq!(spawned.index, 10);
        assert!(spawned.value == 2 || spawned.value == 4);
        assert_eq!(game.get(2, 2), spawned.value);
        assert_eq!(game.spawn_random_tile(&mut rng, 0.5), Err(EngineError::NoEmptyCell));
    }

    #[test]
    fn spawn_honours_four_probability() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut twos = Board::empty(4).unwrap();
        let mut fours = Board::empty(4).unwrap();
        for _ in 0..16 {
            assert_eq!(twos.spawn_random_tile(&mut rng, 0.0).unwrap().value, 2);
            assert_eq!(fours.spawn_random_tile(&mut rng, 1.0).unwrap().value, 4);
        }
        assert_eq!(twos.count_empty(), 0);
        assert!(fours.spawn_random_tile(&mut rng, 2.0).is_err());
    }

    #[test]
    fn from_cells_validates() {
        assert!(matches!(
            Board::from_cells(2, vec![2, 3, 0, 0]),
            Err(EngineError::InvalidTile { index: 1, value: 3 })
        ));
        assert!(Board::from_cells(2, vec![2, 0, 0]).is_err());
        assert!(Board::from_rows(&[vec![2u32, 0], vec![0]]).is_err());
        assert!(Board::from_cells(2, vec![0, 2, 4, 1024]).is_ok());
    }

    #[test]
    fn apply_move_banks_score_only_when_moved() {
        let mut engine = GridEngine::seeded(4, 1).unwrap();
        engine.restore(board(&[[2, 2, 4, 0], [0; 4], [0; 4], [0; 4]]), 10).unwrap();
        let out = engine.apply_move(Move::Left);
        assert!(out.moved);
        assert_eq!(engine.score(), 14);
        assert_eq!(engine.board(), &out.board);
        let again = engine.apply_move(Move::Left);
        assert!(again.moved);
        assert_eq!(again.score_delta, 8);
        assert_eq!(engine.score(), 22);
        assert_eq!(engine.board(), &board(&[[8, 0, 0, 0], [0; 4], [0; 4], [0; 4]]));

        let still = engine.apply_move(Move::Left);
        assert!(!still.moved);
        assert_eq!(still.score_delta, 0);
        assert_eq!(engine.score(), 22);
        assert_eq!(&still.board, engine.board());
        let turn = engine.play(Move::Up).unwrap();
        assert_eq!(turn.spawned, None);
        assert_eq!(engine.score(), 22);
    }

    #[test]
    fn max_tiles_do_not_merge() {
        let top = Board::MAX_TILE;
        let game = Board::from_cells(2, vec![top, top, 0, 0]).unwrap();
        for dir in [Move::Left, Move::Right] {
            let out = game.shift(dir);
            assert!(!out.moved);
            assert_eq!(out.score_delta, 0);
        }
        let down = game.shift(Move::Down);
        assert_eq!(down.board.cells(), &[0, 0, top, top]);
        assert_eq!(down.score_delta, 0);

        let half = Board::from_cells(2, vec![top / 2, top / 2, 0, 0]).unwrap();
        let out = half.shift(Move::Left);
        assert_eq!(out.board.cells(), &[top, 0, 0, 0]);
        assert_eq!(out.score_delta, Score::from(top));

        let full = Board::from_cells(2, vec![top, top, 2, 4]).unwrap();
        assert!(full.is_terminal());
        assert!(Move::ALL.iter().all(|&d| !full.shift(d).moved));
    }

    #[test]
    fn decode_rejects_invalid_boards() {
        let short = postcard::to_allocvec(&Board::unchecked(4, vec![2, 2, 0])).unwrap();
        assert!(postcard::from_bytes::<Board>(&short).is_err());
        let odd = postcard::to_allocvec(&Board::unchecked(2, vec![2, 6, 0, 0])).unwrap();
        assert!(postcard::from_bytes::<Board>(&odd).is_err());
        let tiny = postcard::to_allocvec(&Board::unchecked(1, vec![2])).unwrap();
        assert!(postcard::from_bytes::<Board>(&tiny).is_err());

        let good = Board::from_rows(&[[2u32, 0], [0, 4]]).unwrap();
        let bytes = postcard::to_allocvec(&good).unwrap();
        assert_eq!(postcard::from_bytes::<Board>(&bytes).unwrap(), good);
    }

    #[test]
    fn random_play_holds_invariants() {
        for seed in 0..8 {
            let mut engine = GridEngine::seeded(4, seed).unwrap();
            let mut rng = StdRng::seed_from_u64(seed + 100);
            let mut score = 0;
            while !engine.is_terminal() {
                let before = engine.board().clone();
                let dir = Move::ALL[rng.gen_range(0..4)];
                let turn = engine.play(dir).unwrap();
                let out = &turn.outcome;
                if out.moved {
                    assert_eq!(out.board.tile_sum(), before.tile_sum());
                    let spawned = turn.spawned.unwrap();
                    assert_eq!(engine.board().tile_sum(), before.tile_sum() + Score::from(spawned.value));
                } else {
                    assert_eq!(out.board, before);
                    assert!(!before.shift(dir).moved);
                }
                score += out.score_delta * u64::from(out.moved);
                assert_eq!(engine.score(), score);
                assert!(engine.board().check().is_ok());
            }
            assert!(Move::ALL.iter().all(|&d| !engine.board().shift(d).moved));
        }
    }

    #[test]
    fn terminal_iff_no_move_changes_board() {
        let mut rng = StdRng::seed_from_u64(77);
        for _ in 0..500 {
            let cells: Vec<Tile> = (0..9).map(|_| [0, 2, 4, 8][rng.gen_range(0..4)]).collect();
            let game = Board::from_cells(3, cells).unwrap();
            let stuck = Move::ALL.iter().all(|&d| !game.shift(d).moved);
            assert_eq!(game.is_terminal(), stuck, "{game:?}");
        }
    }

    #[test]
    fn two_by_two_board() {
        let game = Board::from_rows(&[[2u32, 2], [4, 0]]).unwrap();
        let out = game.shift(Move::Right);
        assert_eq!(out.board, Board::from_rows(&[[0u32, 4], [0, 4]]).unwrap());
        let out = out.board.shift(Move::Down);
        assert_eq!(out.board, Board::from_rows(&[[0u32, 0], [0, 8]]).unwrap());
        assert_eq!(out.score_delta, 8);
    }

    #[test]
    fn it_parse_move() {
        assert_eq!("w".parse::<Move>(), Ok(Move::Up));
        assert_eq!(" Left ".parse::<Move>(), Ok(Move::Left));
        assert_eq!("J".parse::<Move>(), Ok(Move::Down));
        assert_eq!("d".parse::<Move>(), Ok(Move::Right));
        assert!("x".parse::<Move>().is_err());
        assert_eq!(Move::Down.to_string(), "down");
    }

    #[test]
    fn it_display_board() {
        let game = Board::from_rows(&[[2u32, 0], [0, 1024]]).unwrap();
        let text = game.to_string();
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("   2   |       "));
        assert!(text.contains(" 1024  "));
    }
}
