//! Player high-score table.
//!
//! Stored as plain text, one `name:score:holder` record per line, where
//! `holder` is whoever held the overall best score when the file was written.
//! On load the holder is re-derived from the scores themselves; a file whose
//! holder field disagrees with that is logged and the scores win.
//! The engine never touches this; shells load it at start-up and save the
//! finished game's score into it.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};

use crate::engine::Score;

#[derive(thiserror::Error, Debug)]
pub enum HighScoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid player name {0:?}")]
    InvalidName(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighScores {
    scores: BTreeMap<String, Score>,
}

impl HighScores {
    pub fn new() -> Self { Self::default() }

    /// Parse the line format, skipping (and logging) records that don't fit.
    ///
    /// ```
    /// use merge_2048::highscores::HighScores;
    /// let hs = HighScores::parse("ann:2048:ann\nbob:512:ann\n");
    /// assert_eq!(hs.best(), Some(("ann", 2048)));
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut table = HighScores::new();
        let mut holders: Vec<&str> = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split(':').collect();
            if parts.len() != 3 {
                warn!("high scores line {}: expected name:score:holder, got {line:?}", line_no + 1);
                continue;
            }
            let name = parts[0].trim();
            let score = match parts[1].trim().parse::<Score>() {
                Ok(score) => score,
                Err(e) => {
                    warn!("high scores line {}: bad score {:?}: {e}", line_no + 1, parts[1]);
                    continue;
                }
            };
            if table.record(name, score).is_err() {
                warn!("high scores line {}: bad name {name:?}", line_no + 1);
                continue;
            }
            let holder = parts[2].trim();
            if !holder.is_empty() {
                holders.push(holder);
            }
        }
        if let Some((best, _)) = table.best() {
            if let Some(stale) = holders.iter().find(|&&holder| holder != best) {
                warn!("high scores name {stale:?} as holder, but {best:?} has the best score");
            }
        }
        table
    }

    /// Names end up as the first field of a record, so they can't be empty
    /// or contain `:` or a line break.
    pub fn check_name(name: &str) -> Result<(), HighScoreError> {
        let name = name.trim();
        if name.is_empty() || name.contains([':', '\n', '\r']) {
            return Err(HighScoreError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Load from `path`; a missing file is an empty table.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, HighScoreError> {
        match fs::read_to_string(path.as_ref()) {
            Ok(text) => Ok(HighScores::parse(&text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HighScores::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Render in the on-disk line format, sorted by name.
    pub fn to_text(&self) -> String {
        let holder = self.best().map(|(name, _)| name).unwrap_or("");
        self.scores
            .iter()
            .map(|(name, score)| format!("{name}:{score}:{holder}\n"))
            .collect()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), HighScoreError> {
        fs::write(path.as_ref(), self.to_text())?;
        info!("saved {} high scores to {}", self.scores.len(), path.as_ref().display());
        Ok(())
    }

    /// Keep the better of the stored and new score for `name`.
    ///
    /// Returns whether the stored score changed.
    pub fn record(&mut self, name: &str, score: Score) -> Result<bool, HighScoreError> {
        HighScores::check_name(name)?;
        let name = name.trim();
        match self.scores.get_mut(name) {
            Some(stored) if *stored >= score => Ok(false),
            Some(stored) => {
                *stored = score;
                Ok(true)
            }
            None => {
                self.scores.insert(name.to_string(), score);
                Ok(true)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Score> { self.scores.get(name.trim()).copied() }

    /// Highest score and who holds it; ties go to the alphabetically first name.
    pub fn best(&self) -> Option<(&str, Score)> {
        self.scores.iter().fold(None, |best, (name, &score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((name.as_str(), score)),
        })
    }

    pub fn len(&self) -> usize { self.scores.len() }

    pub fn is_empty(&self) -> bool { self.scores.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Score)> + '_ {
        self.scores.iter().map(|(name, &score)| (name.as_str(), score))
    }
}
