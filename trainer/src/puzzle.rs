//! Puzzle and source-game records as they appear in the bundled library.

use chess::PieceColor;
use serde::{Deserialize, Serialize};

/// Rating assumed for puzzles that do not declare one.
pub const DEFAULT_PUZZLE_RATING: u32 = 1200;

fn default_rating() -> u32 {
    DEFAULT_PUZZLE_RATING
}

/// Where a puzzle's starting position comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PuzzleSource {
    Fen(String),
    /// Position before the `ply`-th half-move (1-based) of a catalogued game.
    Game { game_id: String, ply: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "position")]
    pub source: PuzzleSource,
    /// Side expected to move in the resolved position.
    pub side: PieceColor,
    #[serde(default = "default_rating")]
    pub rating: u32,
    #[serde(default)]
    pub themes: Vec<String>,
    /// Solution line in SAN or UCI, starting with the side to move.
    #[serde(default)]
    pub best: Vec<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl Puzzle {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn has_theme(&self, theme: &str) -> bool {
        self.themes.iter().any(|t| t.eq_ignore_ascii_case(theme))
    }
}

/// A catalogued game puzzles can point into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGame {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub pgn: String,
}
