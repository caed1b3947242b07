//! Game catalogue and puzzle pool, plus the per-mode puzzle pick.

use crate::puzzle::{Puzzle, SourceGame};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

const BUNDLED_GAMES: &str = include_str!("../defaults/games.json");
const BUNDLED_PUZZLES: &str = include_str!("../defaults/puzzles.json");

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Static catalogue of historical games, looked up by id.
#[derive(Debug, Clone, Default)]
pub struct GameLibrary {
    games: HashMap<String, SourceGame>,
}

impl GameLibrary {
    pub fn from_games(games: Vec<SourceGame>) -> Self {
        Self {
            games: games.into_iter().map(|g| (g.id.clone(), g)).collect(),
        }
    }

    pub fn bundled() -> Result<Self, serde_json::Error> {
        let games: Vec<SourceGame> = serde_json::from_str(BUNDLED_GAMES)?;
        Ok(Self::from_games(games))
    }

    pub fn get(&self, id: &str) -> Option<&SourceGame> {
        self.games.get(id)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

/// Theme and rating-range restriction for custom mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PuzzleFilter {
    pub theme: Option<String>,
    pub min_rating: Option<u32>,
    pub max_rating: Option<u32>,
}

impl PuzzleFilter {
    pub fn matches(&self, puzzle: &Puzzle) -> bool {
        self.theme.as_deref().map_or(true, |t| puzzle.has_theme(t))
            && self.min_rating.map_or(true, |min| puzzle.rating >= min)
            && self.max_rating.map_or(true, |max| puzzle.rating <= max)
    }
}

/// How the next puzzle is chosen.
#[derive(Debug, Clone, Copy)]
pub enum PickStrategy<'a> {
    /// One fixed puzzle per calendar day (UTC day number).
    Daily { day: u64 },
    /// Uniform among the `window` puzzles rated closest to `rating`.
    NearestRating { rating: u32, window: usize },
    /// Uniform among puzzles passing the filter.
    Uniform { filter: &'a PuzzleFilter },
}

/// UTC day number for a unix timestamp.
pub fn day_number(timestamp_secs: u64) -> u64 {
    timestamp_secs / SECS_PER_DAY
}

#[derive(Debug, Clone, Default)]
pub struct PuzzlePool {
    puzzles: Vec<Puzzle>,
}

impl PuzzlePool {
    pub fn new(puzzles: Vec<Puzzle>) -> Self {
        Self { puzzles }
    }

    pub fn bundled() -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(BUNDLED_PUZZLES)?))
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Puzzle> {
        self.puzzles.iter()
    }

    /// Choose a puzzle, never one in `skip`. `avoid` (the puzzle just played)
    /// is only chosen again when nothing else qualifies. Daily picks ignore
    /// `avoid`: the same puzzle all day is the point.
    pub fn pick<'p, R: Rng + ?Sized>(
        &'p self,
        strategy: PickStrategy<'_>,
        avoid: Option<&str>,
        skip: &HashSet<String>,
        rng: &mut R,
    ) -> Option<&'p Puzzle> {
        let usable = || self.puzzles.iter().filter(|p| !skip.contains(&p.id));

        match strategy {
            PickStrategy::Daily { day } => {
                let len = self.puzzles.len();
                if len == 0 {
                    return None;
                }
                let start = (day % len as u64) as usize;
                (0..len)
                    .map(|i| &self.puzzles[(start + i) % len])
                    .find(|p| !skip.contains(&p.id))
            }
            PickStrategy::NearestRating { rating, window } => {
                let mut candidates = prefer_fresh(usable().collect(), avoid);
                candidates.sort_by_key(|p| p.rating.abs_diff(rating));
                candidates.truncate(window.max(1));
                candidates.choose(rng).copied()
            }
            PickStrategy::Uniform { filter } => {
                let candidates = prefer_fresh(usable().filter(|p| filter.matches(p)).collect(), avoid);
                candidates.choose(rng).copied()
            }
        }
    }
}

fn prefer_fresh<'p>(candidates: Vec<&'p Puzzle>, avoid: Option<&str>) -> Vec<&'p Puzzle> {
    if let Some(id) = avoid {
        let fresh: Vec<&Puzzle> = candidates.iter().copied().filter(|p| p.id != id).collect();
        if !fresh.is_empty() {
            return fresh;
        }
    }
    candidates
}
